//! Retry and wait policies.
//!
//! This module groups the knobs that bound **how often** a failing status read is repeated
//! and **how long** the reconciler polls for a state.
//!
//! ## Contents
//! - [`RetryPolicy`]    attempts and exponential backoff (base / multiplier / max + jitter)
//! - [`JitterStrategy`] randomization strategy to avoid synchronized retries
//! - [`WaitPolicy`]     poll interval and timeout of one wait
//!
//! ## Quick wiring
//! ```text
//! StateReconciler { retry: RetryPolicy, wait: WaitPolicy }
//!      ├─► RetryExecutor uses retry.delay(attempt) between failed status reads
//!      └─► Waiter ticks every wait.poll_interval until wait.timeout
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 3 attempts, base=2s, multiplier=2, max=60s, jitter=Equal.
//! - `WaitPolicy::default()`  → poll every 10s, give up after 30min.

mod jitter;
mod retry;
mod wait;

pub use jitter::JitterStrategy;
pub use retry::RetryPolicy;
pub use wait::WaitPolicy;
