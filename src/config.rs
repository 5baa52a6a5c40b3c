//! # Reconciler configuration.
//!
//! [`ReconcilerConfig`] bundles the retry and wait policies a [`StateReconciler`] runs with.
//! It can be built in code or loaded from a human-edited TOML file:
//!
//! ```toml
//! [retry]
//! max_attempts = 5
//! base_backoff_ms = 500
//! multiplier = 2.0
//! max_backoff_ms = 30000
//! jitter = "equal"        # "none" | "full" | "equal"
//!
//! [wait]
//! poll_interval_secs = 5
//! timeout_secs = 900
//! ```
//!
//! Missing sections and fields fall back to the policy defaults. Every load validates.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use convergent::ReconcilerConfig;
//!
//! let cfg = ReconcilerConfig::from_toml_str("[wait]\ntimeout_secs = 60\n").unwrap();
//! assert_eq!(cfg.wait.timeout, Duration::from_secs(60));
//! assert_eq!(cfg.retry.max_attempts, 3);
//! ```
//!
//! [`StateReconciler`]: crate::StateReconciler

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::{JitterStrategy, RetryPolicy, WaitPolicy};

/// Retry and wait policies for one reconciler.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReconcilerConfig {
    pub retry: RetryPolicy,
    pub wait: WaitPolicy,
}

impl ReconcilerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        let cfg = Self::from(file);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.wait.validate()
    }
}

/// Loads config from a TOML file.
///
/// If the file is missing, returns `ReconcilerConfig::default()`.
pub fn load_config(path: &Path) -> Result<ReconcilerConfig, ConfigError> {
    if !path.exists() {
        let cfg = ReconcilerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ReconcilerConfig::from_toml_str(&contents)
}

/// On-disk shape of [`ReconcilerConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    retry: RetrySection,
    wait: WaitSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetrySection {
    max_attempts: u32,
    base_backoff_ms: u64,
    multiplier: f64,
    max_backoff_ms: u64,
    jitter: JitterStrategy,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_backoff_ms: policy.base_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            jitter: policy.jitter,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WaitSection {
    poll_interval_secs: u64,
    timeout_secs: u64,
}

impl Default for WaitSection {
    fn default() -> Self {
        let policy = WaitPolicy::default();
        Self {
            poll_interval_secs: policy.poll_interval.as_secs(),
            timeout_secs: policy.timeout.as_secs(),
        }
    }
}

impl From<ConfigFile> for ReconcilerConfig {
    fn from(file: ConfigFile) -> Self {
        let ConfigFile { retry, wait } = file;
        Self {
            retry: RetryPolicy {
                max_attempts: retry.max_attempts,
                base_backoff: Duration::from_millis(retry.base_backoff_ms),
                multiplier: retry.multiplier,
                max_backoff: Duration::from_millis(retry.max_backoff_ms),
                jitter: retry.jitter,
            },
            wait: WaitPolicy::new(
                Duration::from_secs(wait.poll_interval_secs),
                Duration::from_secs(wait.timeout_secs),
            ),
        }
    }
}
