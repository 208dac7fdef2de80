//! Executor configuration.

use ignis_core::error::{IgnisError, Result};
use ignis_core::journal::parse_bool;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// How long and how hard to wait for a transaction to be final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks required on top of (and including) the inclusion block.
    pub required_confirmations: u64,
    /// Interval between receipt polls.
    pub poll_interval: Duration,
    /// Maximum wait before the action fails with a confirmation timeout.
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            required_confirmations: 1,
            poll_interval: Duration::from_millis(1_000),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ConfirmationPolicy {
    /// Set the required confirmations (at least 1).
    pub fn with_required_confirmations(mut self, n: u64) -> Self {
        self.required_confirmations = n.max(1);
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the confirmation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout in milliseconds, for error reporting.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum actions in flight at once (`K`).
    ///
    /// Most backends serialize transactions per sender anyway, so small
    /// values are the norm. Set to 1 for strictly sequential execution.
    pub max_concurrent_actions: usize,
    /// Confirmation waiting policy.
    pub confirmation: ConfirmationPolicy,
    /// Stop dispatching new actions after the first failure.
    ///
    /// Off by default: a failure only blocks the actions that depend on it,
    /// and independent branches still run to completion.
    pub fail_fast: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_actions: 4,
            confirmation: ConfirmationPolicy::default(),
            fail_fast: false,
        }
    }
}

impl ExecutorConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `IGNIS_MAX_CONCURRENT_ACTIONS`: concurrency limit
    /// - `IGNIS_REQUIRED_CONFIRMATIONS`: confirmations per transaction
    /// - `IGNIS_POLL_INTERVAL_MS`: receipt poll interval
    /// - `IGNIS_CONFIRMATION_TIMEOUT_MS`: maximum confirmation wait
    /// - `IGNIS_FAIL_FAST`: stop after the first failure
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    ///
    /// # Example
    ///
    /// ```bash
    /// export IGNIS_MAX_CONCURRENT_ACTIONS=2
    /// export IGNIS_REQUIRED_CONFIRMATIONS=5
    /// export IGNIS_CONFIRMATION_TIMEOUT_MS=600000
    /// ```
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(k) = env_number::<usize>("IGNIS_MAX_CONCURRENT_ACTIONS")? {
            config = config.with_max_concurrent_actions(k);
        }
        if let Some(n) = env_number::<u64>("IGNIS_REQUIRED_CONFIRMATIONS")? {
            config.confirmation = config.confirmation.with_required_confirmations(n);
        }
        if let Some(ms) = env_number::<u64>("IGNIS_POLL_INTERVAL_MS")? {
            config.confirmation.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number::<u64>("IGNIS_CONFIRMATION_TIMEOUT_MS")? {
            config.confirmation.timeout = Duration::from_millis(ms);
        }
        if let Ok(raw) = env::var("IGNIS_FAIL_FAST") {
            config.fail_fast = parse_bool("IGNIS_FAIL_FAST", &raw)?;
        }

        Ok(config)
    }

    /// Set the concurrency limit (at least 1).
    pub fn with_max_concurrent_actions(mut self, max: usize) -> Self {
        self.max_concurrent_actions = max.max(1);
        self
    }

    /// Set the confirmation policy.
    pub fn with_confirmation(mut self, policy: ConfirmationPolicy) -> Self {
        self.confirmation = policy;
        self
    }

    /// Enable or disable fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

fn env_number<T: FromStr>(field: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(field) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| IgnisError::ConfigValue {
                field: field.to_string(),
                cause: format!("'{}': {}", raw, e),
            }),
        Err(_) => Ok(None),
    }
}
