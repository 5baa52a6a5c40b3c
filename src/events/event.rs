//! # Events emitted while reconciling a resource.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Convergence events**: one `converge` call (started, already converged, converged, failed)
//! - **Transition events**: mutating calls (issued, failed)
//! - **Polling events**: status reads and waits (observed, settling, retry, wait timeout)
//!
//! The [`Event`] struct carries metadata such as the resource id, observed state, action,
//! attempt and delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use convergent::{Action, Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_resource("app-1")
//!     .with_action(Action::Read)
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(4));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.resource.as_deref(), Some("app-1"));
//! assert_eq!(ev.delay_ms, Some(4_000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::resource::{Action, DesiredState, LifecycleState, ResourceKind};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of reconciler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Convergence events ===
    /// `converge` was called.
    ///
    /// Sets: `kind_of`, `resource`, `desired`
    ConvergeStarted,

    /// The observed state already satisfied the desired state; nothing was issued.
    ///
    /// Sets: `kind_of`, `resource`, `state`
    AlreadyConverged,

    /// `converge` returned successfully.
    ///
    /// Sets: `kind_of`, `resource`, `state`, `attempt` (number of transitions issued)
    Converged,

    /// `converge` returned an error.
    ///
    /// Sets: `kind_of`, `resource`, `reason`
    ConvergeFailed,

    // === Transition events ===
    /// A mutating call was accepted by the remote.
    ///
    /// Sets: `kind_of`, `resource`, `action`
    TransitionIssued,

    /// A mutating call failed; it is not retried.
    ///
    /// Sets: `kind_of`, `resource`, `action`, `reason`
    TransitionFailed,

    // === Polling events ===
    /// A status read returned.
    ///
    /// Sets: `kind_of`, `resource`, `state`
    Observed,

    /// A transition is in flight on the resource or its parent; waiting for it to finish.
    ///
    /// Sets: `kind_of`, `resource`, `state`
    WaitingForSettle,

    /// A failed status read will be retried after `delay_ms`.
    ///
    /// Sets: `kind_of`, `resource`, `action`, `attempt` (failed attempt), `delay_ms`, `reason`
    RetryScheduled,

    /// A wait exhausted its timeout; the waiter returned without error.
    ///
    /// Sets: `timeout_ms`, `attempt` (number of checks)
    WaitTimedOut,
}

impl EventKind {
    /// Returns a short stable name (snake_case) for logs and printing.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConvergeStarted => "converge_started",
            EventKind::AlreadyConverged => "already_converged",
            EventKind::Converged => "converged",
            EventKind::ConvergeFailed => "converge_failed",
            EventKind::TransitionIssued => "transition_issued",
            EventKind::TransitionFailed => "transition_failed",
            EventKind::Observed => "observed",
            EventKind::WaitingForSettle => "waiting_for_settle",
            EventKind::RetryScheduled => "retry_scheduled",
            EventKind::WaitTimedOut => "wait_timed_out",
        }
    }
}

/// Reconciler event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Kind of the resource concerned.
    pub kind_of: Option<ResourceKind>,
    /// Id of the resource concerned.
    pub resource: Option<Arc<str>>,
    /// Observed lifecycle state.
    pub state: Option<LifecycleState>,
    /// Desired state handed to `converge`.
    pub desired: Option<DesiredState>,
    /// Remote call concerned.
    pub action: Option<Action>,
    /// Attempt or count, depending on the kind (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Wait timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            kind_of: None,
            resource: None,
            state: None,
            desired: None,
            action: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_kind_of(mut self, kind: ResourceKind) -> Self {
        self.kind_of = Some(kind);
        self
    }

    #[inline]
    pub fn with_resource(mut self, id: impl Into<Arc<str>>) -> Self {
        self.resource = Some(id.into());
        self
    }

    #[inline]
    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = Some(state);
        self
    }

    #[inline]
    pub fn with_desired(mut self, desired: DesiredState) -> Self {
        self.desired = Some(desired);
        self
    }

    #[inline]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[inline]
fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
