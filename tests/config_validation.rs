//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use spatial_voice_bridge::config::{BridgeConfig, DEFAULT_PIPE_NAME};
use spatial_voice_bridge::error::BridgeError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = BridgeConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.transport.pipe_name, DEFAULT_PIPE_NAME);
}

#[test]
fn test_empty_pipe_name() {
    let config = BridgeConfig::default_with_overrides(|c| c.transport.pipe_name = String::new());
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Pipe name cannot be empty")));
}

#[test]
fn test_pipe_name_with_separator() {
    for name in ["a/b", r"a\b", r"\\.\pipe\x"] {
        let config = BridgeConfig::default_with_overrides(|c| c.transport.pipe_name = name.into());
        let errors = config.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.contains("Pipe name must be a bare name without separators")),
            "{name} should be rejected"
        );
    }
}

#[test]
fn test_reconnect_delay_too_short() {
    let config = BridgeConfig::default_with_overrides(|c| {
        c.transport.reconnect_initial = Duration::from_millis(5);
    });
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Reconnect delay too short")));
}

#[test]
fn test_reconnect_max_below_initial() {
    let config = BridgeConfig::default_with_overrides(|c| {
        c.transport.reconnect_initial = Duration::from_secs(2);
        c.transport.reconnect_max = Duration::from_secs(1);
    });
    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Reconnect maximum must not be below the initial delay")));
}

#[test]
fn test_invalid_multiplier() {
    for multiplier in [0.5, 11.0, f64::NAN] {
        let config = BridgeConfig::default_with_overrides(|c| {
            c.transport.reconnect_multiplier = multiplier;
        });
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("Invalid reconnect multiplier")));
    }
}

#[test]
fn test_zero_write_queue() {
    let config = BridgeConfig::default_with_overrides(|c| c.transport.write_queue = 0);
    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Write queue must hold at least one frame")));
}

#[test]
fn test_zero_relay_budget_with_gating() {
    let config = BridgeConfig::default_with_overrides(|c| c.pipeline.relay_updates_per_tick = 0);
    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("relay_updates_per_tick must be greater than 0")));
}

#[test]
fn test_zero_relay_budget_without_gating() {
    let config = BridgeConfig::default_with_overrides(|c| {
        c.pipeline.relay_updates_per_tick = 0;
        c.pipeline.radio_gating = false;
    });
    assert!(config.validate().is_empty());
}

#[test]
fn test_empty_app_name() {
    let config = BridgeConfig::default_with_overrides(|c| c.logging.app_name = String::new());
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_multiple_errors_reported() {
    let config = BridgeConfig::default_with_overrides(|c| {
        c.transport.pipe_name = String::new();
        c.transport.write_queue = 0;
        c.logging.app_name = String::new();
    });
    assert_eq!(config.validate().len(), 3);
}

#[test]
fn test_validate_strict() {
    let valid = BridgeConfig::default();
    assert!(valid.validate_strict().is_ok());

    let invalid = BridgeConfig::default_with_overrides(|c| c.transport.pipe_name = String::new());
    match invalid.validate_strict() {
        Err(BridgeError::ConfigError(msg)) => {
            assert!(msg.starts_with("Configuration validation failed"));
            assert!(msg.contains("Pipe name cannot be empty"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = BridgeConfig::from_toml(
        r#"
        [transport]
        pipe_name = "svb-partial"

        [pipeline]
        relay_updates_per_tick = 4

        [logging]
        log_level = "debug"
        "#,
    )
    .unwrap();
    assert_eq!(config.transport.pipe_name, "svb-partial");
    assert_eq!(config.transport.reconnect_initial, Duration::from_millis(100));
    assert_eq!(config.pipeline.relay_updates_per_tick, 4);
    assert!(config.pipeline.radio_gating);
    assert_eq!(config.logging.log_level, Level::DEBUG);
}

#[test]
fn test_bad_toml_rejected() {
    assert!(matches!(
        BridgeConfig::from_toml("[transport]\nwrite_queue = \"many\""),
        Err(BridgeError::ConfigError(_))
    ));
    assert!(matches!(
        BridgeConfig::from_toml("[logging]\nlog_level = \"loud\""),
        Err(BridgeError::ConfigError(_))
    ));
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.toml");

    let config = BridgeConfig::default_with_overrides(|c| {
        c.transport.pipe_name = String::from("svb-saved");
        c.transport.reconnect_max = Duration::from_secs(30);
        c.pipeline.listener_relative = false;
        c.logging.json_format = true;
    });
    config.save_to_file(&path).unwrap();

    let loaded = BridgeConfig::from_file(&path).unwrap();
    assert_eq!(loaded.transport.pipe_name, "svb-saved");
    assert_eq!(loaded.transport.reconnect_max, Duration::from_secs(30));
    assert!(!loaded.pipeline.listener_relative);
    assert!(loaded.logging.json_format);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        BridgeConfig::from_file(dir.path().join("absent.toml")),
        Err(BridgeError::ConfigError(_))
    ));
}

#[test]
fn test_example_config_parses() {
    let example = BridgeConfig::example_config();
    let parsed = BridgeConfig::from_toml(&example).unwrap();
    assert!(parsed.validate().is_empty());
}
