// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use herald_config::model::StorageConfig;
use herald_core::types::{ItemCounts, OutboundItem, SendItem, Session, SessionStatus, Submission};
use herald_core::{HeraldError, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first call
/// to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, HeraldError> {
        self.db.get().ok_or_else(|| HeraldError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), HeraldError> {
        let db =
            Database::open_with_journal(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| HeraldError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), HeraldError> {
        self.db()?.close().await
    }

    // --- Session operations ---

    async fn create_session(&self, session: &Session) -> Result<(), HeraldError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, HeraldError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, HeraldError> {
        queries::sessions::list_sessions(self.db()?, status).await
    }

    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<(), HeraldError> {
        queries::sessions::update_status(self.db()?, id, status).await
    }

    async fn record_pairing(
        &self,
        id: &str,
        phone: &str,
        display_name: Option<&str>,
        credentials: &[u8],
    ) -> Result<(), HeraldError> {
        queries::sessions::record_pairing(self.db()?, id, phone, display_name, credentials).await
    }

    async fn clear_credentials(&self, id: &str) -> Result<(), HeraldError> {
        queries::sessions::clear_credentials(self.db()?, id).await
    }

    async fn touch_last_used(&self, id: &str) -> Result<(), HeraldError> {
        queries::sessions::touch_last_used(self.db()?, id).await
    }

    async fn delete_session(&self, id: &str) -> Result<(), HeraldError> {
        queries::sessions::delete_session(self.db()?, id).await
    }

    // --- Submission operations ---

    async fn create_submission(
        &self,
        submission: &Submission,
        items: &[OutboundItem],
    ) -> Result<(), HeraldError> {
        queries::submissions::create_submission(self.db()?, submission, items).await
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>, HeraldError> {
        queries::submissions::get_submission(self.db()?, id).await
    }

    async fn list_recent_submissions(&self, limit: i64) -> Result<Vec<Submission>, HeraldError> {
        queries::submissions::list_recent(self.db()?, limit).await
    }

    // --- Send item operations ---

    async fn claim_next(
        &self,
        session_id: &str,
        lease_secs: i64,
    ) -> Result<Option<SendItem>, HeraldError> {
        queries::send_items::claim_next(self.db()?, session_id, lease_secs).await
    }

    async fn mark_sent(&self, item_id: i64) -> Result<(), HeraldError> {
        queries::send_items::mark_sent(self.db()?, item_id).await
    }

    async fn mark_failed(&self, item_id: i64, error: &str) -> Result<(), HeraldError> {
        queries::send_items::mark_failed(self.db()?, item_id, error).await
    }

    async fn release_claim(&self, item_id: i64) -> Result<(), HeraldError> {
        queries::send_items::release(self.db()?, item_id).await
    }

    async fn requeue_expired(&self) -> Result<u64, HeraldError> {
        queries::send_items::requeue_expired(self.db()?).await
    }

    async fn items_for_submission(
        &self,
        submission_id: &str,
    ) -> Result<Vec<SendItem>, HeraldError> {
        queries::send_items::items_for_submission(self.db()?, submission_id).await
    }

    async fn counts_for_submission(
        &self,
        submission_id: &str,
    ) -> Result<ItemCounts, HeraldError> {
        queries::send_items::counts_for_submission(self.db()?, submission_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    fn make_session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            description: "adapter test".to_string(),
            status: SessionStatus::NotAuth,
            phone: None,
            display_name: None,
            credential_blob: None,
            last_used_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.get_session("s").await.is_err());
    }

    #[tokio::test]
    async fn full_submission_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let mut session = make_session("sess-adapter-1");
        session.status = SessionStatus::Paired;
        storage.create_session(&session).await.unwrap();

        let submission = Submission {
            id: "sub-adapter-1".to_string(),
            session_id: "sess-adapter-1".to_string(),
            created_at: "2026-01-01T00:00:01.000Z".to_string(),
        };
        let items = vec![
            OutboundItem {
                recipient: "111".into(),
                content: "A".into(),
            },
            OutboundItem {
                recipient: "222".into(),
                content: "B".into(),
            },
        ];
        storage.create_submission(&submission, &items).await.unwrap();

        let claimed = storage.claim_next("sess-adapter-1", 60).await.unwrap().unwrap();
        assert_eq!(claimed.recipient, "111");
        storage.mark_sent(claimed.id).await.unwrap();

        let claimed = storage.claim_next("sess-adapter-1", 60).await.unwrap().unwrap();
        storage.mark_failed(claimed.id, "no route").await.unwrap();

        let counts = storage.counts_for_submission("sub-adapter-1").await.unwrap();
        assert_eq!(counts.sent, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total, 2);

        let recent = storage.list_recent_submissions(5).await.unwrap();
        assert_eq!(recent.len(), 1);

        storage.close().await.unwrap();
    }
}
