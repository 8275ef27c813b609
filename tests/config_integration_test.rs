//! Configuration-driven registry tests
//!
//! Loads a config file from disk, builds the registry and checks each breaker
//! picked up its own tuning.

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tripwire::breaker::{BreakerConfig, CircuitState};
use tripwire::{AppConfig, LogLevel, TripwireError};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_registry_from_config_file() {
    let file = write_config(
        r#"
        log_level = "warn"

        [breakers.search]
        failure_threshold = 2
        reset_timeout_ms = 60000
        half_open_trial_limit = 1

        [breakers.lyrics]
        preset = "strict"
    "#,
    );

    let config = AppConfig::from_file(file.path()).unwrap();
    assert_eq!(config.log_level, LogLevel::Warn);

    let registry = config.build_registry().unwrap();
    assert_eq!(registry.names(), vec!["lyrics", "search"]);

    let search = registry.get("search").unwrap();
    search.record_failure();
    search.record_failure();
    assert_eq!(search.phase(), CircuitState::Open);

    let lyrics = registry.get("lyrics").unwrap();
    assert_eq!(*lyrics.config(), BreakerConfig::strict());
    assert_eq!(lyrics.phase(), CircuitState::Closed);
    assert_eq!(registry.available(), vec!["lyrics".to_string()]);
}

#[test]
fn test_invalid_entry_names_the_breaker() {
    let file = write_config(
        r#"
        [breakers.ok]

        [breakers.broken]
        reset_timeout_ms = 0
    "#,
    );

    let err = AppConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("'broken'"));
    assert_eq!(err.exit_code(), tripwire::error::EXIT_FATAL);
}

#[test]
fn test_malformed_toml() {
    let file = write_config("[breakers.api\nfailure_threshold = 1");
    let err = AppConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, TripwireError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_configured_breaker_recovers() {
    let config = AppConfig::from_toml_str(
        r#"
        [breakers.api]
        failure_threshold = 1
        reset_timeout_ms = 250
        half_open_trial_limit = 1
    "#,
    )
    .unwrap();

    let api = config.build_registry().unwrap().get("api").unwrap();
    api.record_failure();
    assert!(!api.can_execute());

    tokio::time::advance(Duration::from_millis(250)).await;
    let result = api.execute(|| async { Ok::<_, String>(()) }).await;
    assert!(result.is_ok());
    assert_eq!(api.phase(), CircuitState::Closed);
}
