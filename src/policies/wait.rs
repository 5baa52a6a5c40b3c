//! Polling policy for [`Waiter`](crate::Waiter).

use std::time::Duration;

use crate::error::ConfigError;

/// How often to poll and for how long, for a single wait.
///
/// Each wait gets its own value; `converge` runs up to two waits, each with the full
/// `timeout` budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between two checks (`> 0`).
    pub poll_interval: Duration,
    /// Budget after which the wait gives up.
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    /// - `poll_interval = 10s`
    /// - `timeout = 30min`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("wait.poll_interval must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_poll_every_ten_seconds_for_half_an_hour() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(10));
        assert_eq!(policy.timeout, Duration::from_secs(1800));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let policy = WaitPolicy::new(Duration::ZERO, Duration::from_secs(5));
        assert!(matches!(policy.validate(), Err(ConfigError::Invalid(_))));
    }
}
