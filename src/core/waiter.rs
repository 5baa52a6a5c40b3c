//! # Waiter: poll a condition until it holds or the budget runs out.
//!
//! ```text
//! check(ctx) ── done ──► Ok(())
//!    │
//!    └─ not done ─► loop {
//!         select! {
//!           ctx.cancelled()       ─► Err(Canceled)
//!           deadline reached      ─► publish WaitTimedOut, Ok(())
//!           tick(poll_interval)   ─► check(ctx) ── done ──► Ok(())
//!                                       └─ Err(e) ──► Err(e)
//!         }
//!       }
//! ```
//!
//! ## Rules
//! - `check` runs once before the first tick, then once per `poll_interval`.
//! - Errors from `check` are returned as-is; retrying them belongs inside `check`.
//! - Running out of `timeout` returns `Ok(())`. The timeout is logged at `warn` and
//!   published as `WaitTimedOut`, but the caller sees the same result as success.
//! - Durations that overflow the clock are clamped to a far-future instant.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::WaitPolicy;
use crate::resource::ResourceKind;

/// Stand-in for "never" when a duration does not fit on the clock (roughly 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Polls a condition per a [`WaitPolicy`].
#[derive(Clone, Debug, Default)]
pub struct Waiter {
    policy: WaitPolicy,
    bus: Option<Bus>,
    subject: Option<(ResourceKind, Arc<str>)>,
}

impl Waiter {
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            policy,
            bus: None,
            subject: None,
        }
    }

    /// Publishes `WaitTimedOut` when the budget runs out.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub(crate) fn with_bus_opt(mut self, bus: Option<Bus>) -> Self {
        self.bus = bus;
        self
    }

    /// Attributes timeout logs and events to a resource.
    pub fn with_subject(mut self, kind: ResourceKind, id: impl Into<Arc<str>>) -> Self {
        self.subject = Some((kind, id.into()));
        self
    }

    #[inline]
    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Calls `check` until it reports `true`, `ctx` is cancelled, or the timeout elapses.
    ///
    /// ### Returns
    /// - `Ok(())` once `check` reports `true`, **or** once the timeout elapses.
    /// - `Err(e)` as soon as `check` fails.
    /// - `Err(ReconcileError::Canceled)` if `ctx` fires between polls.
    pub async fn wait<F, Fut>(
        &self,
        mut check: F,
        ctx: &CancellationToken,
    ) -> Result<(), ReconcileError>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<bool, ReconcileError>>,
    {
        let start = Instant::now();
        let deadline = after(start, self.policy.timeout);

        if check(ctx.clone()).await? {
            return Ok(());
        }

        let poll = self.policy.poll_interval;
        let mut ticker = time::interval_at(after(start, poll), poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u32 = 1;

        loop {
            select! {
                biased;
                _ = ctx.cancelled() => return Err(ReconcileError::Canceled),
                _ = time::sleep_until(deadline) => {
                    self.timed_out(polls);
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            polls += 1;
            debug!(poll = polls, "polling");
            if check(ctx.clone()).await? {
                return Ok(());
            }
        }
    }

    fn timed_out(&self, polls: u32) {
        let timeout = self.policy.timeout;
        match &self.subject {
            Some((kind, id)) => warn!(
                kind = %kind,
                id = %id,
                polls,
                timeout_ms = timeout.as_millis() as u64,
                "wait timed out, continuing as if satisfied"
            ),
            None => warn!(
                polls,
                timeout_ms = timeout.as_millis() as u64,
                "wait timed out, continuing as if satisfied"
            ),
        }

        if let Some(bus) = &self.bus {
            let mut ev = Event::new(EventKind::WaitTimedOut)
                .with_timeout(timeout)
                .with_attempt(polls);
            if let Some((kind, id)) = &self.subject {
                ev = ev.with_kind_of(*kind).with_resource(Arc::clone(id));
            }
            bus.publish(ev);
        }
    }
}

/// `start + d`, clamped to [`FAR_FUTURE`] when the sum overflows.
fn after(start: Instant, d: Duration) -> Instant {
    start
        .checked_add(d)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}
