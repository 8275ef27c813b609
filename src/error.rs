/*!
 * Error types for Tripwire
 */

use std::fmt;
use std::io;
use std::path::PathBuf;
use tripwire_core_breaker::{ConfigError, RegistryError};

pub type Result<T> = std::result::Result<T, TripwireError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum TripwireError {
    /// Configuration file could not be read or parsed
    Config(String),

    /// A configured breaker has invalid settings
    InvalidBreaker { name: String, source: ConfigError },

    /// Breaker name not present in the registry
    UnknownBreaker(String),

    /// Registry rejected an operation
    Registry(RegistryError),

    /// Simulation script could not be parsed
    Scenario(String),

    /// Config file not found
    ConfigNotFound(PathBuf),

    /// I/O error
    Io(io::Error),

    /// Output serialization failed
    Output(String),
}

impl TripwireError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TripwireError::Config(_)
            | TripwireError::InvalidBreaker { .. }
            | TripwireError::ConfigNotFound(_)
            | TripwireError::Scenario(_) => EXIT_FATAL,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for TripwireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripwireError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TripwireError::InvalidBreaker { name, source } => {
                write!(f, "Invalid settings for breaker '{}': {}", name, source)
            }
            TripwireError::UnknownBreaker(name) => write!(f, "Unknown breaker: {}", name),
            TripwireError::Registry(e) => write!(f, "Registry error: {}", e),
            TripwireError::Scenario(msg) => write!(f, "Invalid scenario: {}", msg),
            TripwireError::ConfigNotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
            TripwireError::Io(e) => write!(f, "I/O error: {}", e),
            TripwireError::Output(msg) => write!(f, "Output error: {}", msg),
        }
    }
}

impl std::error::Error for TripwireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TripwireError::InvalidBreaker { source, .. } => Some(source),
            TripwireError::Registry(e) => Some(e),
            TripwireError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TripwireError {
    fn from(err: io::Error) -> Self {
        TripwireError::Io(err)
    }
}

impl From<RegistryError> for TripwireError {
    fn from(err: RegistryError) -> Self {
        TripwireError::Registry(err)
    }
}

impl From<toml::de::Error> for TripwireError {
    fn from(err: toml::de::Error) -> Self {
        TripwireError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TripwireError {
    fn from(err: serde_json::Error) -> Self {
        TripwireError::Output(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(TripwireError::Config("bad".into()).exit_code(), EXIT_FATAL);
        assert_eq!(TripwireError::Scenario("x".into()).exit_code(), EXIT_FATAL);
        assert_eq!(
            TripwireError::UnknownBreaker("api".into()).exit_code(),
            EXIT_FAILURE
        );
    }

    #[test]
    fn test_invalid_breaker_display_and_source() {
        use std::error::Error;

        let err = TripwireError::InvalidBreaker {
            name: "api".to_string(),
            source: ConfigError::ZeroTrialLimit,
        };
        assert_eq!(
            err.to_string(),
            "Invalid settings for breaker 'api': half_open_trial_limit must be greater than zero"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_registry_conversion() {
        let err: TripwireError = RegistryError::AlreadyRegistered("api".into()).into();
        assert!(matches!(err, TripwireError::Registry(_)));
    }
}
