//! # Jitter strategy for retry delays.
//!
//! [`JitterStrategy`] randomizes backoff delays so that many reconcilers retrying the same
//! overloaded API do not hit it in lockstep.
//!
//! - [`JitterStrategy::None`]: no randomization, predictable delays
//! - [`JitterStrategy::Full`]: random delay in [0, backoff]
//! - [`JitterStrategy::Equal`]: random delay in [backoff/2, backoff] (default)

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Strategy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterStrategy {
    /// Use the exact backoff delay. Useful for tests and single callers.
    None,

    /// Random delay in [0, backoff]. Most aggressive spreading.
    Full,

    /// Random delay in [backoff/2, backoff]. Keeps ~75% of the backoff on average.
    #[default]
    Equal,
}

impl JitterStrategy {
    /// Applies the strategy to `delay`. A zero delay always stays zero.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterStrategy::None => delay,
            JitterStrategy::Full => full_jitter(delay),
            JitterStrategy::Equal => equal_jitter(delay),
        }
    }
}

/// Full jitter: random[0, delay]
fn full_jitter(delay: Duration) -> Duration {
    let nanos = as_nanos_saturating(delay);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..=nanos))
}

/// Equal jitter: random[ceil(delay/2), delay]
fn equal_jitter(delay: Duration) -> Duration {
    let nanos = as_nanos_saturating(delay);
    if nanos == 0 {
        return Duration::ZERO;
    }
    let low = nanos - nanos / 2;
    Duration::from_nanos(rand::rng().random_range(low..=nanos))
}

#[inline]
fn as_nanos_saturating(delay: Duration) -> u64 {
    delay.as_nanos().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_jitter_stays_within_half_and_full() {
        for base_ms in [1u64, 2, 3, 10, 999, 2_000, 60_000] {
            let base = Duration::from_millis(base_ms);
            for _ in 0..200 {
                let delay = JitterStrategy::Equal.apply(base);
                assert!(delay >= base / 2, "{delay:?} < half of {base:?}");
                assert!(delay <= base, "{delay:?} > {base:?}");
            }
        }
    }

    #[test]
    fn equal_jitter_of_one_nanosecond() {
        let tiny = Duration::from_nanos(1);
        assert_eq!(JitterStrategy::Equal.apply(tiny), tiny);
    }

    #[test]
    fn zero_stays_zero() {
        for strategy in [
            JitterStrategy::None,
            JitterStrategy::Full,
            JitterStrategy::Equal,
        ] {
            assert_eq!(strategy.apply(Duration::ZERO), Duration::ZERO);
        }
    }

    #[test]
    fn full_jitter_bounds() {
        let base = Duration::from_secs(2);
        for _ in 0..200 {
            assert!(JitterStrategy::Full.apply(base) <= base);
        }
    }

    #[test]
    fn none_is_identity() {
        let base = Duration::from_millis(1234);
        assert_eq!(JitterStrategy::None.apply(base), base);
    }
}
