//! Resource kinds and the actions issued against them.

use std::fmt;

use super::state::LifecycleState;

/// Kind of remotely-managed resource a reconciler is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Application,
    Container,
    Database,
    Environment,
    Cluster,
    Job,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Application => "application",
            ResourceKind::Container => "container",
            ResourceKind::Database => "database",
            ResourceKind::Environment => "environment",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Job => "job",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote call attempted on behalf of a reconciler.
///
/// `Read` and `ReadParent` are status calls and safe to repeat; the others mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    ReadParent,
    Deploy,
    Stop,
    Restart,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::ReadParent => "read parent of",
            Action::Deploy => "deploy",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Delete => "delete",
        }
    }

    #[inline]
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::Read | Action::ReadParent)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutating call the reconciler can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Deploy,
    Stop,
    Restart,
    Delete,
}

impl Transition {
    /// State the resource settles in once the transition completes remotely.
    pub fn target_state(&self) -> LifecycleState {
        match self {
            Transition::Deploy | Transition::Restart => LifecycleState::Running,
            Transition::Stop => LifecycleState::Stopped,
            Transition::Delete => LifecycleState::Deleted,
        }
    }

    #[inline]
    pub fn action(&self) -> Action {
        Action::from(*self)
    }
}

impl From<Transition> for Action {
    fn from(t: Transition) -> Self {
        match t {
            Transition::Deploy => Action::Deploy,
            Transition::Stop => Action::Stop,
            Transition::Restart => Action::Restart,
            Transition::Delete => Action::Delete,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action().as_str())
    }
}
