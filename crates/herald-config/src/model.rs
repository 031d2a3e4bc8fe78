// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Herald dispatch engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Herald configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Connection lifecycle and resume settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Dispatch worker pool settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "herald".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Whether to enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "herald.db".to_string()
}

fn default_true() -> bool {
    true
}

/// Connection lifecycle configuration.
///
/// A session that loses its connection is resumed with stored credentials:
/// up to `resume_max_attempts` attempts, exponential backoff starting at
/// `resume_backoff_ms` and capped at `resume_backoff_max_ms`. Exhausting the
/// attempts clears the credentials and forces re-pairing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default = "default_resume_max_attempts")]
    pub resume_max_attempts: u32,

    #[serde(default = "default_resume_backoff_ms")]
    pub resume_backoff_ms: u64,

    #[serde(default = "default_resume_backoff_max_ms")]
    pub resume_backoff_max_ms: u64,

    /// How long `remove_session`/shutdown waits for a connection to close
    /// before logging and moving on.
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            resume_max_attempts: default_resume_max_attempts(),
            resume_backoff_ms: default_resume_backoff_ms(),
            resume_backoff_max_ms: default_resume_backoff_max_ms(),
            close_timeout_secs: default_close_timeout_secs(),
        }
    }
}

fn default_resume_max_attempts() -> u32 {
    5
}

fn default_resume_backoff_ms() -> u64 {
    2000
}

fn default_resume_backoff_max_ms() -> u64 {
    60_000
}

fn default_close_timeout_secs() -> u64 {
    5
}

/// Dispatch worker pool configuration.
///
/// The pool is deliberately small by default; the external protocol is
/// rate-sensitive.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Number of concurrent dispatch workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Sleep between empty-claim cycles.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Claim lease length; an `in_progress` item older than this is returned
    /// to `pending` by the reaper.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: i64,

    /// How often the reaper scans for expired claims.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Grace period for in-flight sends during shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            idle_backoff_ms: default_idle_backoff_ms(),
            claim_lease_secs: default_claim_lease_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}

fn default_idle_backoff_ms() -> u64 {
    750
}

fn default_claim_lease_secs() -> i64 {
    120
}

fn default_reaper_interval_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}
