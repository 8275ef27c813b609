//! Breaker configuration
//!
//! A [`BreakerConfig`] can only be obtained through [`BreakerConfig::new`],
//! [`Default`], or one of the named presets, so every breaker is built from
//! non-zero thresholds.
//!
//! # Example
//!
//! ```
//! use tripwire_core_breaker::BreakerConfig;
//! use std::time::Duration;
//!
//! let config = BreakerConfig::new(3, Duration::from_secs(10), 1).unwrap();
//! assert_eq!(config.failure_threshold(), 3);
//!
//! assert!(BreakerConfig::new(0, Duration::from_secs(10), 1).is_err());
//! ```

use crate::error::ConfigError;
use std::time::Duration;

/// Immutable tuning of a single breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_trial_limit: u32,
}

impl BreakerConfig {
    /// Default consecutive-failure threshold
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    /// Default cooldown before probing
    pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(30_000);
    /// Default number of half-open trials
    pub const DEFAULT_HALF_OPEN_TRIAL_LIMIT: u32 = 2;

    /// Build a validated configuration
    pub fn new(
        failure_threshold: u32,
        reset_timeout: Duration,
        half_open_trial_limit: u32,
    ) -> Result<Self, ConfigError> {
        if failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if reset_timeout.is_zero() {
            return Err(ConfigError::ZeroResetTimeout);
        }
        if half_open_trial_limit == 0 {
            return Err(ConfigError::ZeroTrialLimit);
        }

        Ok(Self {
            failure_threshold,
            reset_timeout,
            half_open_trial_limit,
        })
    }

    /// Preset for slow, easily overloaded upstreams: trips after 3 failures,
    /// cools down for 5 minutes and probes with a single trial call.
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(300_000),
            half_open_trial_limit: 1,
        }
    }

    /// Consecutive failures that trip the breaker while closed
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Minimum time spent open before a probe is allowed
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Successes needed to close from half-open, and the cap on admitted trials
    pub fn half_open_trial_limit(&self) -> u32 {
        self.half_open_trial_limit
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: Self::DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: Self::DEFAULT_RESET_TIMEOUT,
            half_open_trial_limit: Self::DEFAULT_HALF_OPEN_TRIAL_LIMIT,
        }
    }
}
