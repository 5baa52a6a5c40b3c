//! # Resource model and per-kind collaborators.
//!
//! - [`LifecycleState`], [`Freshness`], [`Observation`] what the remote reports
//! - [`DesiredState`] what the caller asks for
//! - [`ResourceKind`], [`Action`] labels used in errors, logs and events
//! - [`Transition`] the mutating subset of [`Action`]
//! - [`StatusReader`], [`ActionInvoker`] the capabilities each kind supplies

mod driver;
mod kind;
mod state;

pub use driver::{ActionInvoker, StatusReader};
pub use kind::{Action, ResourceKind, Transition};
pub use state::{DesiredState, Freshness, LifecycleState, Observation};
