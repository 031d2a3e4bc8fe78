// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths and coherent backoff bounds.

use crate::diagnostic::ConfigError;
use crate::model::HeraldConfig;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HeraldConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let level = config.service.log_level.as_str();
    if !VALID_LOG_LEVELS.contains(&level) {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.log_level `{level}` is not one of: {}",
                VALID_LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.dispatch.worker_count == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.worker_count must be at least 1".to_string(),
        });
    }

    if config.dispatch.claim_lease_secs <= 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.claim_lease_secs must be positive, got {}",
                config.dispatch.claim_lease_secs
            ),
        });
    }

    if config.connection.resume_backoff_max_ms < config.connection.resume_backoff_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "connection.resume_backoff_max_ms ({}) must be >= connection.resume_backoff_ms ({})",
                config.connection.resume_backoff_max_ms, config.connection.resume_backoff_ms
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = HeraldConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = HeraldConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut config = HeraldConfig::default();
        config.service.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("log_level"))));
    }

    #[test]
    fn zero_workers_fails_validation() {
        let mut config = HeraldConfig::default();
        config.dispatch.worker_count = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("worker_count"))));
    }

    #[test]
    fn inverted_backoff_bounds_fail_validation() {
        let mut config = HeraldConfig::default();
        config.connection.resume_backoff_ms = 10_000;
        config.connection.resume_backoff_max_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = HeraldConfig::default();
        config.storage.database_path = " ".to_string();
        config.dispatch.worker_count = 0;
        config.dispatch.claim_lease_secs = -1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
