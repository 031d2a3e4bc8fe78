// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Herald configuration system.

use herald_config::diagnostic::{suggest_key, ConfigError};
use herald_config::model::HeraldConfig;
use herald_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_herald_config() {
    let toml = r#"
[service]
name = "herald-test"
log_level = "debug"

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[connection]
resume_max_attempts = 3
resume_backoff_ms = 1000
resume_backoff_max_ms = 30000
close_timeout_secs = 2

[dispatch]
worker_count = 2
idle_backoff_ms = 100
claim_lease_secs = 60
reaper_interval_secs = 15
shutdown_grace_secs = 5
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "herald-test");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.connection.resume_max_attempts, 3);
    assert_eq!(config.connection.resume_backoff_ms, 1000);
    assert_eq!(config.connection.resume_backoff_max_ms, 30000);
    assert_eq!(config.connection.close_timeout_secs, 2);
    assert_eq!(config.dispatch.worker_count, 2);
    assert_eq!(config.dispatch.idle_backoff_ms, 100);
    assert_eq!(config.dispatch.claim_lease_secs, 60);
    assert_eq!(config.dispatch.reaper_interval_secs, 15);
    assert_eq!(config.dispatch.shutdown_grace_secs, 5);
}

/// Unknown field in [dispatch] section produces an UnknownField error.
#[test]
fn unknown_field_in_dispatch_produces_error() {
    let toml = r#"
[dispatch]
worker_cnt = 4
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    // Figment wraps serde's deny_unknown_fields error
    assert!(
        err_str.contains("unknown field") || err_str.contains("worker_cnt"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.name, "herald");
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.storage.database_path, "herald.db");
    assert!(config.storage.wal_mode);
    assert_eq!(config.connection.resume_max_attempts, 5);
    assert_eq!(config.connection.resume_backoff_ms, 2000);
    assert_eq!(config.connection.resume_backoff_max_ms, 60_000);
    assert_eq!(config.dispatch.worker_count, 4);
    assert_eq!(config.dispatch.claim_lease_secs, 120);
}

/// An override merged after TOML wins, matching env var precedence.
#[test]
fn override_layer_wins_over_toml() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[service]
name = "from-toml"
"#;

    let config: HeraldConfig = Figment::new()
        .merge(Serialized::defaults(HeraldConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("service.name", "from-env"))
        .extract()
        .expect("should merge env override");

    assert_eq!(config.service.name, "from-env");
}

/// Dotted override maps to the underscored key, not a nested table.
#[test]
fn dotted_override_hits_underscored_key() {
    use figment::{providers::Serialized, Figment};

    let config: HeraldConfig = Figment::new()
        .merge(Serialized::defaults(HeraldConfig::default()))
        .merge(("storage.database_path", "/data/h.db"))
        .extract()
        .expect("should set database_path via dot notation");

    assert_eq!(config.storage.database_path, "/data/h.db");
}

/// load_and_validate_str surfaces validation errors as ConfigError::Validation.
#[test]
fn validate_str_rejects_zero_workers() {
    let toml = r#"
[dispatch]
worker_count = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero workers should fail validation");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("worker_count"))));
}

/// load_and_validate_str accepts a fully-defaulted config.
#[test]
fn validate_str_accepts_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.dispatch.worker_count, 4);
}

/// Typo suggestions surface the closest valid key.
#[test]
fn typo_suggestion_for_config_key() {
    let valid = &[
        "resume_max_attempts",
        "resume_backoff_ms",
        "resume_backoff_max_ms",
        "close_timeout_secs",
    ];
    assert_eq!(
        suggest_key("resume_max_attemps", valid),
        Some("resume_max_attempts".to_string())
    );
}

/// Wrong value type produces a readable error.
#[test]
fn wrong_type_produces_error() {
    let toml = r#"
[dispatch]
worker_count = "many"
"#;

    let err = load_config_from_str(toml).expect_err("string for usize should fail");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("worker_count"),
        "error should mention the type mismatch, got: {err_str}"
    );
}
