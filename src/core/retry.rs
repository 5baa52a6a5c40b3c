//! # RetryExecutor: bounded, jittered retries of a status call.
//!
//! Runs a caller-supplied operation, repeating it on retryable failures.
//!
//! ```text
//! loop {
//!   ├─► attempt += 1
//!   ├─► op() ── Ok ──► return Ok
//!   │     └─ Err(e)
//!   │          ├─ token cancelled          ─► return Err(e)
//!   │          ├─ !is_retryable(e)         ─► return Err(e)
//!   │          ├─ attempt == max_attempts  ─► return Err(e)
//!   │          └─ publish RetryScheduled, sleep(policy.delay(attempt)) (cancellable)
//! }
//! ```
//!
//! ## Rules
//! - The operation is invoked at most `max_attempts` times.
//! - Cancellation during the backoff sleep returns the last failure immediately.
//! - Retries repeat the operation's side effects: only idempotent calls (status reads) belong here.

use std::future::Future;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify;
use crate::error::OperationError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryPolicy;

/// Repeats idempotent calls per a [`RetryPolicy`].
#[derive(Clone, Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    bus: Option<Bus>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, bus: None }
    }

    /// Publishes a `RetryScheduled` event before every backoff sleep.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub(crate) fn with_bus_opt(mut self, bus: Option<Bus>) -> Self {
        self.bus = bus;
        self
    }

    #[inline]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` once immediately, then again after each retryable failure until it succeeds,
    /// the attempt budget is spent, or `ctx` is cancelled. Returns the last failure otherwise.
    pub async fn execute<T, F, Fut>(
        &self,
        mut op: F,
        ctx: &CancellationToken,
    ) -> Result<T, OperationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if ctx.is_cancelled() {
                debug!(attempt, "cancelled, not retrying");
                return Err(err);
            }
            if !classify::is_retryable(&err) {
                debug!(attempt, class = err.as_label(), "permanent failure, not retrying");
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(attempt, err = %err, "retry budget exhausted");
                return Err(err);
            }

            let delay = self.policy.delay(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                err = %err,
                "retryable failure, backing off"
            );
            if let Some(bus) = &self.bus {
                bus.publish(
                    Event::new(EventKind::RetryScheduled)
                        .with_kind_of(err.kind())
                        .with_resource(err.resource_id())
                        .with_action(err.action())
                        .with_attempt(attempt)
                        .with_delay(delay)
                        .with_reason(err.to_string()),
                );
            }

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                biased;
                _ = ctx.cancelled() => return Err(err),
                _ = &mut sleep => {}
            }
        }
    }
}
