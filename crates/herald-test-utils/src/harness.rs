// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete dispatch stack -- temp SQLite database,
//! mock wire connector, session manager, and dispatcher -- with timings tuned
//! for fast, deterministic CI runs.

use std::sync::Arc;
use std::time::Duration;

use herald_config::model::{ConnectionConfig, DispatchConfig, StorageConfig};
use herald_core::{HeraldError, SessionStatus, StorageAdapter, SubmissionStatus};
use herald_dispatch::{DispatchRunner, Dispatcher, WorkerPool};
use herald_session::SessionManager;
use herald_storage::SqliteStorage;

use crate::mock_wire::MockWire;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    auto_pair: bool,
    worker_count: usize,
    resume_max_attempts: u32,
    claim_lease_secs: i64,
    send_delay: Option<Duration>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            auto_pair: true,
            worker_count: 2,
            resume_max_attempts: 3,
            claim_lease_secs: 60,
            send_delay: None,
        }
    }

    /// Pairing waits for an injected `PairingComplete` instead of completing
    /// automatically on open.
    pub fn with_manual_pairing(mut self) -> Self {
        self.auto_pair = false;
        self
    }

    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_resume_attempts(mut self, attempts: u32) -> Self {
        self.resume_max_attempts = attempts;
        self
    }

    pub fn with_claim_lease_secs(mut self, secs: i64) -> Self {
        self.claim_lease_secs = secs;
        self
    }

    /// Artificial delay inside every mock send, for race tests.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, HeraldError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| HeraldError::Storage {
            source: e.into(),
        })?;
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let storage_config = StorageConfig {
            database_path: db_path_str.clone(),
            wal_mode: true,
        };
        let storage = SqliteStorage::new(storage_config);
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let wire = if self.auto_pair {
            MockWire::new()
        } else {
            MockWire::with_manual_pairing()
        };
        if let Some(delay) = self.send_delay {
            wire.set_send_delay(delay);
        }

        let connection_config = ConnectionConfig {
            resume_max_attempts: self.resume_max_attempts,
            resume_backoff_ms: 10,
            resume_backoff_max_ms: 50,
            close_timeout_secs: 1,
        };

        let dispatch_config = DispatchConfig {
            worker_count: self.worker_count,
            idle_backoff_ms: 25,
            claim_lease_secs: self.claim_lease_secs,
            reaper_interval_secs: 1,
            shutdown_grace_secs: 2,
        };

        let manager = Arc::new(SessionManager::new(
            Arc::clone(&storage),
            Arc::new(wire.clone()),
            connection_config.clone(),
        ));

        let dispatcher = Dispatcher::new(Arc::clone(&storage));

        Ok(TestHarness {
            storage,
            wire,
            manager,
            dispatcher,
            connection_config,
            dispatch_config,
            db_path: db_path_str,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete dispatch stack on a temp database.
pub struct TestHarness {
    pub storage: Arc<dyn StorageAdapter>,
    pub wire: MockWire,
    pub manager: Arc<SessionManager>,
    pub dispatcher: Dispatcher,
    pub connection_config: ConnectionConfig,
    pub dispatch_config: DispatchConfig,
    /// Path of the backing database, for restart-simulation tests.
    pub db_path: String,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Start the worker pool against this harness's storage and manager.
    pub fn spawn_workers(&self) -> DispatchRunner {
        WorkerPool::spawn(
            Arc::clone(&self.storage),
            Arc::clone(&self.manager),
            self.dispatch_config.clone(),
        )
    }

    /// Create a session, connect it, and wait until it is paired.
    pub async fn create_paired_session(&self) -> Result<String, HeraldError> {
        let session = self.manager.create_session("harness session").await?;
        self.manager.connect(&session.id).await?;
        self.wait_for_status(&session.id, SessionStatus::Paired, Duration::from_secs(5))
            .await?;
        Ok(session.id)
    }

    /// Poll the manager until the session reaches `expected`.
    pub async fn wait_for_status(
        &self,
        session_id: &str,
        expected: SessionStatus,
        timeout: Duration,
    ) -> Result<(), HeraldError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.manager.status(session_id).await? == expected {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HeraldError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Poll progress until the submission completes.
    pub async fn wait_until_completed(
        &self,
        submission_id: &str,
        timeout: Duration,
    ) -> Result<(), HeraldError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let counts = self.dispatcher.counts(submission_id).await?;
            if counts.status == SubmissionStatus::Completed {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HeraldError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
