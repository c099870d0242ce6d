//! Tests for bootstrap configuration loading and graceful degradation
//!
//! Tests that manipulate LESSONPLAY_CONFIG or LESSONPLAY_DATABASE are marked
//! with #[serial] so they never race on the process environment.

use lessonplay_common::config::{PlayerConfig, CONFIG_ENV_VAR, DATABASE_ENV_VAR};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_defaults_are_valid() {
    let config = PlayerConfig::default();
    config.validate().unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.sync.reconcile_interval_ms, 500);
    assert_eq!(config.media.external_domains.len(), 2);
    assert!(config.voice.endpoint.is_none());
    assert!(config.database_path.ends_with("lessonplay.db"));
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = PlayerConfig::from_toml_str(
        r#"
        database_path = "/tmp/lp.db"

        [voice]
        endpoint = "http://localhost:9000/tts"

        [sync]
        reconcile_interval_ms = 250
        "#,
    )
    .unwrap();

    assert_eq!(config.database_path, PathBuf::from("/tmp/lp.db"));
    assert_eq!(config.voice.endpoint.as_deref(), Some("http://localhost:9000/tts"));
    assert_eq!(config.voice.fallback_rate, 0.9);
    assert_eq!(config.sync.reconcile_interval_ms, 250);
    assert_eq!(config.sync.event_bus_capacity, 256);
    assert_eq!(config.media.placeholder_url, "/images/lesson-placeholder.png");
}

#[test]
fn test_zero_interval_rejected() {
    let result = PlayerConfig::from_toml_str("[sync]\nreconcile_interval_ms = 0\n");
    assert!(result.is_err());
}

#[test]
fn test_malformed_toml_rejected() {
    assert!(PlayerConfig::from_toml_str("database_path = [").is_err());
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    env::remove_var(DATABASE_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let config = PlayerConfig::load(Some(&missing), None).unwrap();
    assert_eq!(config, PlayerConfig::default());
}

#[test]
#[serial]
fn test_cli_database_beats_env_and_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "database_path = \"/from/file.db\"\n").unwrap();

    env::set_var(DATABASE_ENV_VAR, "/from/env.db");
    let cli_db = PathBuf::from("/from/cli.db");
    let config = PlayerConfig::load(Some(&config_path), Some(&cli_db)).unwrap();
    assert_eq!(config.database_path, cli_db);

    let config = PlayerConfig::load(Some(&config_path), None).unwrap();
    assert_eq!(config.database_path, PathBuf::from("/from/env.db"));

    env::remove_var(DATABASE_ENV_VAR);
    let config = PlayerConfig::load(Some(&config_path), None).unwrap();
    assert_eq!(config.database_path, PathBuf::from("/from/file.db"));
}

#[test]
#[serial]
fn test_env_config_path_used_without_cli() {
    env::remove_var(DATABASE_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("env.toml");
    std::fs::write(&config_path, "[logging]\nlevel = \"debug\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &config_path);
    let config = PlayerConfig::load(None, None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.logging.level, "debug");
}
