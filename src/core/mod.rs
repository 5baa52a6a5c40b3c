//! Reconciliation core: retry, wait and convergence.
//!
//! The public API from this module is [`StateReconciler`]; [`RetryExecutor`] and [`Waiter`]
//! are exported for callers that need the building blocks on their own.
//!
//! Internal modules:
//! - [`retry`]: repeats idempotent status reads with jittered exponential backoff;
//! - [`waiter`]: polls a condition on an interval until it holds or times out;
//! - [`reconciler`]: observes, serializes behind in-flight transitions, acts and waits.

mod reconciler;
mod retry;
mod waiter;

pub use reconciler::{ConvergeOptions, Convergence, StateReconciler};
pub use retry::RetryExecutor;
pub use waiter::Waiter;
