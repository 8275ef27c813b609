//! Tripwire Core Breaker: a pure-logic circuit breaker
//!
//! # Overview
//!
//! A [`CircuitBreaker`] sits between a caller and one remote dependency. It
//! counts consecutive failures, stops admitting calls once a threshold is hit,
//! waits out a cooldown, and then lets a bounded number of trial calls probe
//! the dependency before restoring full traffic.
//!
//! The crate has no knowledge of payloads or protocols; it only sees success
//! and failure signals. It owns no threads and no timers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │ registry.get("name")
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Breaker Registry                  │  ← One breaker per dependency
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Admit / reject
//! │  (Closed → Open → HalfOpen → Closed)    │
//! └─────────────┬───────────────────────────┘
//!               │ transitions
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Transition Listener               │  ← tracing by default
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use tripwire_core_breaker::{BreakerConfig, CircuitBreaker, ExecuteError};
//! use std::time::Duration;
//!
//! # async fn fetch() -> Result<String, std::io::Error> { Ok(String::new()) }
//! # async fn example() {
//! let config = BreakerConfig::new(3, Duration::from_secs(10), 1).unwrap();
//! let breaker = CircuitBreaker::new("catalog", config);
//!
//! match breaker.execute(fetch).await {
//!     Ok(body) => println!("{}", body),
//!     Err(ExecuteError::Open(e)) => eprintln!("skipped: {}", e),
//!     Err(ExecuteError::Inner(e)) => eprintln!("upstream failed: {}", e),
//! }
//! # }
//! ```
//!
//! Callers that perform the call themselves use the raw API instead:
//! [`CircuitBreaker::try_admit`], then [`CircuitBreaker::record_success`] or
//! [`CircuitBreaker::record_failure`].

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod events;
pub mod registry;

// Re-export main types for convenience
pub use circuit_breaker::{BreakerStats, CircuitBreaker, CircuitState};
pub use config::BreakerConfig;
pub use error::{CircuitOpenError, ConfigError, ExecuteError, RegistryError};
pub use events::{
    RecordingListener, TracingListener, TransitionEvent, TransitionKind, TransitionListener,
};
pub use registry::BreakerRegistry;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use tripwire_core_breaker::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitState};
    pub use super::config::BreakerConfig;
    pub use super::error::{CircuitOpenError, ExecuteError};
    pub use super::registry::BreakerRegistry;
}
