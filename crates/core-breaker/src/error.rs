//! Error types for the circuit breaker

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Admission was denied because the breaker is open, or half-open with no
/// trial slots left.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is open, rejecting call")]
pub struct CircuitOpenError {
    /// Name of the breaker that rejected the call
    pub name: String,
}

/// Invalid breaker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failure_threshold must be greater than zero")]
    ZeroFailureThreshold,

    #[error("reset_timeout must be greater than zero")]
    ZeroResetTimeout,

    #[error("half_open_trial_limit must be greater than zero")]
    ZeroTrialLimit,
}

/// Errors raised by [`BreakerRegistry`](crate::BreakerRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A breaker with this name already exists
    #[error("circuit breaker '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Result of a call routed through [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
///
/// The wrapped call's own error is carried untouched in `Inner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError<E> {
    /// The call was never invoked
    Open(CircuitOpenError),
    /// The call ran and failed
    Inner(E),
}

impl<E> ExecuteError<E> {
    /// True when the breaker rejected the call
    pub fn is_open(&self) -> bool {
        matches!(self, ExecuteError::Open(_))
    }

    /// The wrapped call's error, if the call actually ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            ExecuteError::Open(_) => None,
            ExecuteError::Inner(e) => Some(e),
        }
    }
}

impl<E> From<CircuitOpenError> for ExecuteError<E> {
    fn from(err: CircuitOpenError) -> Self {
        ExecuteError::Open(err)
    }
}

impl<E: fmt::Display> fmt::Display for ExecuteError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::Open(e) => write!(f, "{}", e),
            ExecuteError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: StdError + 'static> StdError for ExecuteError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExecuteError::Open(_) => None,
            ExecuteError::Inner(e) => e.source(),
        }
    }
}
