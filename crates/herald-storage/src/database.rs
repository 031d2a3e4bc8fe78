// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use herald_core::HeraldError;
use tracing::debug;

/// Handle to the single SQLite connection.
///
/// Query modules accept `&Database` and go through [`Database::connection`];
/// tokio-rusqlite serializes every closure on one background thread, which is
/// what makes the claim transition atomic without `SQLITE_BUSY` churn.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` with WAL mode and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, HeraldError> {
        Self::open_with_journal(path, true).await
    }

    /// Open with an explicit journal mode choice (`wal = false` keeps the
    /// rollback journal; used for databases on filesystems without mmap).
    pub async fn open_with_journal(path: &str, wal: bool) -> Result<Self, HeraldError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        let journal = if wal { "WAL" } else { "DELETE" };
        let pragmas = format!(
            "PRAGMA journal_mode = {journal};
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;"
        );

        conn.call(move |conn| {
            conn.execute_batch(&pragmas)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(|e| HeraldError::Storage {
                source: Box::new(e),
            })?;

        debug!(path, journal, "database opened");
        Ok(Self { conn })
    }

    /// The shared connection. All access goes through `connection().call()`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(&self) -> Result<(), HeraldError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into the workspace storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> HeraldError {
    HeraldError::Storage {
        source: Box::new(e),
    }
}

/// Timestamp string in the stored format (UTC, millisecond precision).
///
/// Matches the `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` form used in SQL so
/// lexicographic comparison against stored values is valid.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// A timestamp `secs` seconds in the future, in the stored format.
pub fn timestamp_after_secs(secs: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(secs))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
