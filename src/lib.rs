//! # convergent
//!
//! **Convergent** is a client-side control loop that drives remotely-managed resources
//! (applications, clusters, databases, environments, ...) toward a desired lifecycle state
//! over an unreliable network, against an API that performs transitions asynchronously.
//!
//! It is built from three small primitives and one algorithm on top of them:
//! fault classification, bounded jittered retry, polling waits, and convergence.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                      caller (CRUD façade, CLI, operator, ...)
//!                                     │ converge(id, desired, opts)
//!                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StateReconciler (one per ResourceKind)                           │
//! │  - RetryPolicy / WaitPolicy (explicit values, no globals)         │
//! │  - optional Bus (broadcast events)                                │
//! └──────┬───────────────────────────┬───────────────────────┬────────┘
//!        │ status reads              │ polls                 │ transitions
//!        ▼                           ▼                       ▼
//!   ┌──────────────┐          ┌──────────────┐        ┌──────────────┐
//!   │RetryExecutor │◄─────────│    Waiter    │        │ActionInvoker │
//!   │(classify,    │  check() │ (interval,   │        │deploy / stop │
//!   │ backoff)     │          │  timeout)    │        │restart/delete│
//!   └──────┬───────┘          └──────────────┘        └──────┬───────┘
//!          ▼                                                 │
//!   ┌──────────────┐                                         │
//!   │ StatusReader │                                         │
//!   │get_state /   │                                         │
//!   │parent state  │                                         │
//!   └──────┬───────┘                                         │
//!          └──────────────────────┬──────────────────────────┘
//!                                 ▼
//!                        remote API (system of record)
//! ```
//!
//! ### Failures
//! ```text
//! RemoteFailure { response?, cause? }
//!        │ attributed at the single point a call fails
//!        ▼
//! OperationError { action, kind, id, ResponseSnapshot?, cause? }
//!        │
//!        ├─ classify::fault_class ─► Transport | Server | RateLimited | Client | Unclassified
//!        ├─ status reads:  retried while is_retryable, up to max_attempts
//!        └─ transitions:   never retried, returned to the caller
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                               |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------------|
//! | **Convergence**   | Observe, serialize, act and wait for one resource.             | [`StateReconciler`], [`ConvergeOptions`]         |
//! | **Collaborators** | Per-kind capabilities supplied by the caller.                  | [`StatusReader`], [`ActionInvoker`]              |
//! | **Retry / wait**  | Building blocks, usable on their own.                          | [`RetryExecutor`], [`Waiter`]                    |
//! | **Policies**      | Explicit, validated configuration values.                      | [`RetryPolicy`], [`WaitPolicy`], [`JitterStrategy`] |
//! | **Errors**        | Typed errors and fault classification.                         | [`OperationError`], [`ReconcileError`], [`FaultClass`] |
//! | **Events**        | Broadcast lifecycle events for dashboards, metrics and tests.  | [`Bus`], [`Event`], [`EventKind`]                |
//! | **Configuration** | TOML loading of policies.                                      | [`ReconcilerConfig`], [`load_config`]            |
//!
//! ## Optional features
//! - `logging`: exports [`logging::init`], a stderr `tracing` subscriber _(demo/reference only)_.
//! - `test-support`: exports [`test_support::ScriptedDriver`], a scripted in-memory driver.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use convergent::{
//!     ActionInvoker, ConvergeOptions, DesiredState, LifecycleState, Observation, RemoteFailure,
//!     ResourceKind, StateReconciler, StatusReader, TransportResponse,
//! };
//!
//! struct AlreadyStopped;
//!
//! #[async_trait]
//! impl StatusReader for AlreadyStopped {
//!     async fn get_state(&self, _: &CancellationToken, _: &str) -> Result<Observation, RemoteFailure> {
//!         Ok(Observation::new(LifecycleState::Stopped))
//!     }
//! }
//!
//! #[async_trait]
//! impl ActionInvoker for AlreadyStopped {
//!     async fn deploy(&self, _: &CancellationToken, _: &str) -> Result<TransportResponse, RemoteFailure> {
//!         Ok(TransportResponse::empty(202))
//!     }
//!     async fn stop(&self, _: &CancellationToken, _: &str) -> Result<TransportResponse, RemoteFailure> {
//!         Ok(TransportResponse::empty(202))
//!     }
//!     async fn restart(&self, _: &CancellationToken, _: &str) -> Result<TransportResponse, RemoteFailure> {
//!         Ok(TransportResponse::empty(202))
//!     }
//!     async fn delete(&self, _: &CancellationToken, _: &str) -> Result<TransportResponse, RemoteFailure> {
//!         Ok(TransportResponse::empty(204))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reconciler = StateReconciler::for_driver(ResourceKind::Container, Arc::new(AlreadyStopped));
//!     let token = CancellationToken::new();
//!
//!     let done = reconciler
//!         .converge(&token, "web-1", DesiredState::Stopped, ConvergeOptions::default())
//!         .await?;
//!
//!     assert!(done.transitions.is_empty());
//!     Ok(())
//! }
//! ```
pub mod classify;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod resource;
mod transport;

// ---- Public re-exports ----

pub use classify::{is_retryable, is_transient, FaultClass};
pub use config::{load_config, ReconcilerConfig};
pub use crate::core::{ConvergeOptions, Convergence, RetryExecutor, StateReconciler, Waiter};
pub use error::{ConfigError, OperationError, ReconcileError, ResponseSnapshot};
pub use events::{Bus, Event, EventKind};
pub use policies::{JitterStrategy, RetryPolicy, WaitPolicy};
pub use resource::{
    Action, ActionInvoker, DesiredState, Freshness, LifecycleState, Observation, ResourceKind,
    StatusReader, Transition,
};
pub use transport::{BoxError, RemoteFailure, TransportError, TransportResponse};

// Optional: stderr tracing subscriber for binaries and demos.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub mod logging;

// Scripted collaborators for tests.
// Enable with: `--features test-support`
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
