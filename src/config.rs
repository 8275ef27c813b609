/*!
 * Configuration types for Tripwire
 *
 * A config file names every protected dependency and tunes its breaker:
 *
 * ```toml
 * log_level = "info"
 *
 * [breakers.search]
 * failure_threshold = 5
 * reset_timeout_ms = 30000
 * half_open_trial_limit = 2
 *
 * [breakers.lyrics]
 * preset = "strict"
 * ```
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tripwire_core_breaker::{BreakerConfig, BreakerRegistry, ConfigError};

use crate::error::{Result, TripwireError};

/// Named starting point for a breaker's settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// 5 failures, 30 s cooldown, 2 trials
    #[default]
    Default,
    /// 3 failures, 5 min cooldown, 1 trial
    Strict,
}

impl Preset {
    pub fn all() -> [Preset; 2] {
        [Preset::Default, Preset::Strict]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Strict => "strict",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Default => "General purpose upstreams",
            Preset::Strict => "Fragile or rate-limited third-party APIs",
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        match self {
            Preset::Default => BreakerConfig::default(),
            Preset::Strict => BreakerConfig::strict(),
        }
    }
}

/// Settings for one breaker; unset fields fall back to the preset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerSettings {
    #[serde(default)]
    pub preset: Preset,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_open_trial_limit: Option<u32>,
}

impl BreakerSettings {
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            preset,
            ..Default::default()
        }
    }

    /// Resolve against the preset and validate
    pub fn to_breaker_config(&self) -> std::result::Result<BreakerConfig, ConfigError> {
        let base = self.preset.breaker_config();
        BreakerConfig::new(
            self.failure_threshold.unwrap_or(base.failure_threshold()),
            self.reset_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.reset_timeout()),
            self.half_open_trial_limit
                .unwrap_or(base.half_open_trial_limit()),
        )
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors; breaker trips show up here
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above; includes half-open and recovery transitions
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Breakers keyed by dependency name
    #[serde(default)]
    pub breakers: BTreeMap<String, BreakerSettings>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TripwireError::ConfigNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| TripwireError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check every breaker entry resolves to a valid configuration
    pub fn validate(&self) -> Result<()> {
        for (name, settings) in &self.breakers {
            settings
                .to_breaker_config()
                .map_err(|source| TripwireError::InvalidBreaker {
                    name: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Build a registry holding one breaker per configured entry
    pub fn build_registry(&self) -> Result<BreakerRegistry> {
        let registry = BreakerRegistry::new();
        for (name, settings) in &self.breakers {
            let config = settings
                .to_breaker_config()
                .map_err(|source| TripwireError::InvalidBreaker {
                    name: name.clone(),
                    source,
                })?;
            registry.register(name, config)?;
        }
        Ok(registry)
    }
}
