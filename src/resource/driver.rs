//! # Per-kind collaborators consumed by the reconciler.
//!
//! Each resource kind supplies two small capabilities:
//! - [`StatusReader`] observes the current state (and, for nested kinds, the parent's state);
//! - [`ActionInvoker`] issues the fire-and-forget transitions.
//!
//! Both receive the caller's [`CancellationToken`] and should abort in-flight I/O once it fires.
//! Failures are reported as raw [`RemoteFailure`]s; the reconciler turns them into
//! [`OperationError`](crate::OperationError)s at the single point where a call fails.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use convergent::{LifecycleState, Observation, RemoteFailure, StatusReader};
//!
//! struct AlwaysRunning;
//!
//! #[async_trait]
//! impl StatusReader for AlwaysRunning {
//!     async fn get_state(
//!         &self,
//!         _ctx: &CancellationToken,
//!         _id: &str,
//!     ) -> Result<Observation, RemoteFailure> {
//!         Ok(Observation::new(LifecycleState::Running))
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::kind::ResourceKind;
use super::state::{LifecycleState, Observation};
use crate::transport::{RemoteFailure, TransportResponse};

/// Reads the lifecycle state of one resource kind.
#[async_trait]
pub trait StatusReader: Send + Sync + 'static {
    /// Observes the resource. A resource that no longer exists should be reported as
    /// [`LifecycleState::Deleted`] rather than as a failure.
    async fn get_state(&self, ctx: &CancellationToken, id: &str)
        -> Result<Observation, RemoteFailure>;

    /// Kind of the owning resource whose transitions block this one, if any.
    fn parent_kind(&self) -> Option<ResourceKind> {
        None
    }

    /// State of the owning resource of `id`; `None` when the kind has no parent.
    async fn get_parent_state(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<Option<LifecycleState>, RemoteFailure> {
        Ok(None)
    }
}

/// Issues transitions on one resource kind.
///
/// Calls return as soon as the remote accepted the request; the transition itself
/// runs asynchronously and is observed through [`StatusReader`].
#[async_trait]
pub trait ActionInvoker: Send + Sync + 'static {
    async fn deploy(&self, ctx: &CancellationToken, id: &str)
        -> Result<TransportResponse, RemoteFailure>;

    async fn stop(&self, ctx: &CancellationToken, id: &str)
        -> Result<TransportResponse, RemoteFailure>;

    async fn restart(&self, ctx: &CancellationToken, id: &str)
        -> Result<TransportResponse, RemoteFailure>;

    async fn delete(&self, ctx: &CancellationToken, id: &str)
        -> Result<TransportResponse, RemoteFailure>;
}
