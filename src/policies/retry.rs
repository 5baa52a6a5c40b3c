//! # Retry policy for status reads.
//!
//! [`RetryPolicy`] bounds how often a failing call is repeated and how long to wait in
//! between. The delay before retry `n` (1-based, counted after the `n`-th failure) is:
//!
//! ```text
//! jitter( min(base_backoff × multiplier^(n-1), max_backoff) )
//! ```
//!
//! The pre-jitter base is derived purely from the attempt number, so jitter output never
//! feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use convergent::{JitterStrategy, RetryPolicy};
//!
//! let policy = RetryPolicy {
//!     jitter: JitterStrategy::None,
//!     ..RetryPolicy::default()
//! };
//!
//! assert_eq!(policy.delay(1), Duration::from_secs(2));
//! assert_eq!(policy.delay(2), Duration::from_secs(4));
//! assert_eq!(policy.delay(3), Duration::from_secs(8));
//! ```

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::jitter::JitterStrategy;

/// Immutable retry configuration, passed explicitly to every executor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (`>= 1`).
    pub max_attempts: u32,
    /// Delay before the first retry, before jitter.
    pub base_backoff: Duration,
    /// Growth factor between retries (`>= 1.0`).
    pub multiplier: f64,
    /// Cap applied to the pre-jitter delay.
    pub max_backoff: Duration,
    /// Randomization applied to every delay.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    /// - `max_attempts = 3`
    /// - `base_backoff = 2s`
    /// - `multiplier = 2.0`
    /// - `max_backoff = 60s`
    /// - `jitter = Equal`
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(60),
            jitter: JitterStrategy::Equal,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Pre-jitter backoff after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_backoff.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() || secs < 0.0 || secs > self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs)
    }

    /// Jittered delay to sleep after the `attempt`-th failure (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.backoff(attempt))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.multiplier must be a finite number >= 1.0".into(),
            ));
        }
        if self.max_backoff < self.base_backoff {
            return Err(ConfigError::Invalid(
                "retry.max_backoff must be >= retry.base_backoff".into(),
            ));
        }
        Ok(())
    }
}
