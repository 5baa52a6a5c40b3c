//! # Lifecycle states reported by the remote system.
//!
//! [`LifecycleState`] is the remote vocabulary; its categories are derived, never stored:
//! - **in-progress**: a transition is running (`DEPLOYING`, `STOPPING`, `*_QUEUED`, ...)
//! - **error**: the last transition failed (`*_ERROR`)
//! - **final**: anything that is not in-progress (`RUNNING`, `STOPPED`, `DELETED`, errors)
//!
//! ```text
//!   STOPPED ──deploy──► DEPLOYMENT_QUEUED ──► DEPLOYING ──► RUNNING
//!                                                │
//!                                                └────────► DEPLOYMENT_ERROR
//! ```
//!
//! Names the crate does not know are kept verbatim in [`LifecycleState::Unknown`] and
//! categorized by suffix, so a new in-progress state added remotely is still waited on.

use std::fmt;
use std::str::FromStr;

/// Status of a managed resource as last observed remotely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Running,
    Stopped,
    Deleted,
    Ready,
    Canceled,

    Deploying,
    Stopping,
    Deleting,
    Restarting,
    Building,
    Canceling,
    Queued,
    DeploymentQueued,
    StopQueued,
    DeleteQueued,
    RestartQueued,

    DeploymentError,
    StopError,
    DeleteError,
    RestartError,
    BuildError,

    /// A state name this crate does not recognize.
    Unknown(String),
}

impl LifecycleState {
    /// Wire name of the state, e.g. `DEPLOYMENT_ERROR`.
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::Running => "RUNNING",
            LifecycleState::Stopped => "STOPPED",
            LifecycleState::Deleted => "DELETED",
            LifecycleState::Ready => "READY",
            LifecycleState::Canceled => "CANCELED",
            LifecycleState::Deploying => "DEPLOYING",
            LifecycleState::Stopping => "STOPPING",
            LifecycleState::Deleting => "DELETING",
            LifecycleState::Restarting => "RESTARTING",
            LifecycleState::Building => "BUILDING",
            LifecycleState::Canceling => "CANCELING",
            LifecycleState::Queued => "QUEUED",
            LifecycleState::DeploymentQueued => "DEPLOYMENT_QUEUED",
            LifecycleState::StopQueued => "STOP_QUEUED",
            LifecycleState::DeleteQueued => "DELETE_QUEUED",
            LifecycleState::RestartQueued => "RESTART_QUEUED",
            LifecycleState::DeploymentError => "DEPLOYMENT_ERROR",
            LifecycleState::StopError => "STOP_ERROR",
            LifecycleState::DeleteError => "DELETE_ERROR",
            LifecycleState::RestartError => "RESTART_ERROR",
            LifecycleState::BuildError => "BUILD_ERROR",
            LifecycleState::Unknown(name) => name,
        }
    }

    /// Whether a transition is currently running on the resource.
    pub fn is_in_progress(&self) -> bool {
        match self {
            LifecycleState::Deploying
            | LifecycleState::Stopping
            | LifecycleState::Deleting
            | LifecycleState::Restarting
            | LifecycleState::Building
            | LifecycleState::Canceling
            | LifecycleState::Queued
            | LifecycleState::DeploymentQueued
            | LifecycleState::StopQueued
            | LifecycleState::DeleteQueued
            | LifecycleState::RestartQueued => true,
            LifecycleState::Unknown(name) => {
                (name.ends_with("ING") && name != "RUNNING") || name.ends_with("QUEUED")
            }
            _ => false,
        }
    }

    /// Whether the last transition on the resource failed.
    pub fn is_error(&self) -> bool {
        self.as_str().ends_with("_ERROR")
    }

    /// Terminal/stable: no transition is running, a new action would be accepted.
    #[inline]
    pub fn is_final(&self) -> bool {
        !self.is_in_progress()
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = std::convert::Infallible;

    /// Parses a wire name; unrecognized names become [`LifecycleState::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        Ok(match name.as_str() {
            "RUNNING" => LifecycleState::Running,
            "STOPPED" => LifecycleState::Stopped,
            "DELETED" => LifecycleState::Deleted,
            "READY" => LifecycleState::Ready,
            "CANCELED" => LifecycleState::Canceled,
            "DEPLOYING" => LifecycleState::Deploying,
            "STOPPING" => LifecycleState::Stopping,
            "DELETING" => LifecycleState::Deleting,
            "RESTARTING" => LifecycleState::Restarting,
            "BUILDING" => LifecycleState::Building,
            "CANCELING" => LifecycleState::Canceling,
            "QUEUED" => LifecycleState::Queued,
            "DEPLOYMENT_QUEUED" => LifecycleState::DeploymentQueued,
            "STOP_QUEUED" => LifecycleState::StopQueued,
            "DELETE_QUEUED" => LifecycleState::DeleteQueued,
            "RESTART_QUEUED" => LifecycleState::RestartQueued,
            "DEPLOYMENT_ERROR" => LifecycleState::DeploymentError,
            "STOP_ERROR" => LifecycleState::StopError,
            "DELETE_ERROR" => LifecycleState::DeleteError,
            "RESTART_ERROR" => LifecycleState::RestartError,
            "BUILD_ERROR" => LifecycleState::BuildError,
            _ => LifecycleState::Unknown(name),
        })
    }
}

/// Deployment-freshness flag: whether the running version matches the latest configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    UpToDate,
    OutOfDate,
    NeverDeployed,
    #[default]
    Unknown,
}

impl Freshness {
    #[inline]
    pub fn is_out_of_date(&self) -> bool {
        matches!(self, Freshness::OutOfDate)
    }
}

/// One observation of a resource: its state plus the freshness flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub state: LifecycleState,
    pub freshness: Freshness,
}

impl Observation {
    /// Observation with an [`Freshness::Unknown`] freshness flag.
    pub fn new(state: LifecycleState) -> Self {
        Self {
            state,
            freshness: Freshness::Unknown,
        }
    }

    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = freshness;
        self
    }
}

/// Target requested by the caller; never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Running,
    Stopped,
    Restarted,
    Deleted,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Running => "RUNNING",
            DesiredState::Stopped => "STOPPED",
            DesiredState::Restarted => "RESTARTED",
            DesiredState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
