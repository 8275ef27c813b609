/*!
 * Tripwire - circuit breakers for remote dependencies
 *
 * The breaker state machine lives in the `tripwire-core-breaker` crate. This
 * crate adds what an application needs around it:
 * - TOML configuration of named breakers and presets
 * - Structured logging of breaker transitions
 * - A scripted simulator for trying out breaker settings
 */

pub mod cli_style;
pub mod config;
pub mod error;
pub mod logging;
pub mod simulate;

// Re-export commonly used types
pub use config::{AppConfig, BreakerSettings, LogLevel, Preset};
pub use error::{Result, TripwireError};
pub use simulate::{run_scenario, Scenario, ScenarioSummary, Step, StepOutcome, StepReport};
pub use tripwire_core_breaker as breaker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
