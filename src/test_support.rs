//! Scripted collaborators for exercising the reconciler without a remote.
//!
//! [`ScriptedDriver`] implements both [`StatusReader`] and [`ActionInvoker`]:
//! - reads replay a queue of scripted outcomes; the last one repeats forever;
//! - a successful transition can swap in a new read queue (what the remote does next);
//! - actions answer `200` unless scripted otherwise;
//! - every call is recorded as an [`Action`] so tests can assert exact counts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::resource::{
    Action, ActionInvoker, Freshness, LifecycleState, Observation, ResourceKind, StatusReader,
    Transition,
};
use crate::transport::{RemoteFailure, TransportError, TransportResponse};

/// A scripted failure of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedFailure {
    /// The remote answered with `status` and an optional body.
    Status(u16, Option<String>),
    /// The call failed below HTTP.
    Transport(TransportError),
}

impl ScriptedFailure {
    fn to_remote(&self) -> RemoteFailure {
        match self {
            ScriptedFailure::Status(status, Some(body)) => {
                RemoteFailure::response(TransportResponse::with_bytes(*status, body.clone()))
            }
            ScriptedFailure::Status(status, None) => {
                RemoteFailure::response(TransportResponse::empty(*status))
            }
            ScriptedFailure::Transport(err) => RemoteFailure::from(err.clone()),
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Respond(u16),
    Fail(ScriptedFailure),
}

#[derive(Debug, Default)]
struct Script {
    reads: VecDeque<Result<Observation, ScriptedFailure>>,
    parent_kind: Option<ResourceKind>,
    parents: VecDeque<LifecycleState>,
    after: HashMap<Transition, Vec<Observation>>,
    outcomes: HashMap<Transition, VecDeque<Outcome>>,
    calls: Vec<Action>,
}

impl Script {
    fn next_read(&mut self) -> Result<Observation, ScriptedFailure> {
        let next = if self.reads.len() > 1 {
            self.reads.pop_front()
        } else {
            self.reads.front().cloned()
        };
        next.unwrap_or_else(|| Ok(Observation::new(LifecycleState::Deleted)))
    }

    fn next_parent(&mut self) -> Option<LifecycleState> {
        if self.parents.len() > 1 {
            self.parents.pop_front()
        } else {
            self.parents.front().cloned()
        }
    }
}

/// In-memory stand-in for a per-kind driver.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    script: Mutex<Script>,
}

impl ScriptedDriver {
    /// Driver whose reads report `states` in order, each up to date.
    pub fn with_states(states: impl IntoIterator<Item = LifecycleState>) -> Self {
        Self::with_observations(
            states
                .into_iter()
                .map(|s| Observation::new(s).with_freshness(Freshness::UpToDate)),
        )
    }

    /// Driver whose reads report `observations` in order.
    pub fn with_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        let driver = Self::default();
        driver.lock().reads = observations.into_iter().map(Ok).collect();
        driver
    }

    /// Appends a failing read to the read queue.
    pub fn then_fail_read(self, failure: ScriptedFailure) -> Self {
        self.lock().reads.push_back(Err(failure));
        self
    }

    /// Appends a successful read to the read queue.
    pub fn then_read(self, observation: Observation) -> Self {
        self.lock().reads.push_back(Ok(observation));
        self
    }

    /// Once `transition` succeeds, reads replay `states` (up to date) instead.
    pub fn after(
        self,
        transition: Transition,
        states: impl IntoIterator<Item = LifecycleState>,
    ) -> Self {
        let observations = states
            .into_iter()
            .map(|s| Observation::new(s).with_freshness(Freshness::UpToDate))
            .collect();
        self.lock().after.insert(transition, observations);
        self
    }

    /// Once `transition` succeeds, reads replay `observations` instead.
    pub fn after_observations(
        self,
        transition: Transition,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Self {
        self.lock()
            .after
            .insert(transition, observations.into_iter().collect());
        self
    }

    /// The next `transition` fails with `failure`.
    pub fn fail(self, transition: Transition, failure: ScriptedFailure) -> Self {
        self.lock()
            .outcomes
            .entry(transition)
            .or_default()
            .push_back(Outcome::Fail(failure));
        self
    }

    /// The next `transition` succeeds at transport level with `status`.
    pub fn respond(self, transition: Transition, status: u16) -> Self {
        self.lock()
            .outcomes
            .entry(transition)
            .or_default()
            .push_back(Outcome::Respond(status));
        self
    }

    /// Declares an owning resource of `kind` whose reads replay `states`.
    pub fn with_parent(
        self,
        kind: ResourceKind,
        states: impl IntoIterator<Item = LifecycleState>,
    ) -> Self {
        {
            let mut script = self.lock();
            script.parent_kind = Some(kind);
            script.parents = states.into_iter().collect();
        }
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Action> {
        self.lock().calls.clone()
    }

    /// Number of calls of `action` made so far.
    pub fn count(&self, action: Action) -> usize {
        self.lock().calls.iter().filter(|a| **a == action).count()
    }

    /// Mutating calls made so far, in order.
    pub fn mutations(&self) -> Vec<Action> {
        self.lock()
            .calls
            .iter()
            .copied()
            .filter(Action::is_mutating)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn act(&self, transition: Transition) -> Result<TransportResponse, RemoteFailure> {
        let mut script = self.lock();
        script.calls.push(transition.action());
        let outcome = script
            .outcomes
            .get_mut(&transition)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Respond(200));

        match outcome {
            Outcome::Fail(failure) => Err(failure.to_remote()),
            Outcome::Respond(status) => {
                if status < 300 {
                    if let Some(next) = script.after.get(&transition).cloned() {
                        script.reads = next.into_iter().map(Ok).collect();
                    }
                }
                Ok(TransportResponse::empty(status))
            }
        }
    }
}

#[async_trait]
impl StatusReader for ScriptedDriver {
    async fn get_state(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<Observation, RemoteFailure> {
        let mut script = self.lock();
        script.calls.push(Action::Read);
        script.next_read().map_err(|f| f.to_remote())
    }

    fn parent_kind(&self) -> Option<ResourceKind> {
        self.lock().parent_kind
    }

    async fn get_parent_state(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<Option<LifecycleState>, RemoteFailure> {
        let mut script = self.lock();
        script.calls.push(Action::ReadParent);
        Ok(script.next_parent())
    }
}

#[async_trait]
impl ActionInvoker for ScriptedDriver {
    async fn deploy(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        self.act(Transition::Deploy)
    }

    async fn stop(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        self.act(Transition::Stop)
    }

    async fn restart(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        self.act(Transition::Restart)
    }

    async fn delete(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        self.act(Transition::Delete)
    }
}
