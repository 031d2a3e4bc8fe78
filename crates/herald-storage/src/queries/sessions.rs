// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD and lifecycle operations.

use herald_core::HeraldError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::{Session, SessionStatus};

const SESSION_COLUMNS: &str = "id, description, status, phone, display_name, credential_blob,
     last_used_at, created_at, updated_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let status_str: String = row.get(2)?;
    let status: SessionStatus = status_str.parse().map_err(|e: strum::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Session {
        id: row.get(0)?,
        description: row.get(1)?,
        status,
        phone: row.get(3)?,
        display_name: row.get(4)?,
        credential_blob: row.get(5)?,
        last_used_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Create a new session record.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), HeraldError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, description, status, phone, display_name,
                     credential_blob, last_used_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    session.id,
                    session.description,
                    session.status.to_string(),
                    session.phone,
                    session.display_name,
                    session.credential_blob,
                    session.last_used_at,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by ID.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List sessions, optionally filtered by status.
pub async fn list_sessions(
    db: &Database,
    status: Option<SessionStatus>,
) -> Result<Vec<Session>, HeraldError> {
    db.connection()
        .call(move |conn| {
            let mut sessions = Vec::new();
            match status {
                Some(filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions
                         WHERE status = ?1 ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![filter.to_string()], row_to_session)?;
                    for row in rows {
                        sessions.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map([], row_to_session)?;
                    for row in rows {
                        sessions.push(row?);
                    }
                }
            }
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

/// Update a session's status and updated_at timestamp.
pub async fn update_status(
    db: &Database,
    id: &str,
    status: SessionStatus,
) -> Result<(), HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Persist pairing identity, credentials, and the `paired` status in one write.
pub async fn record_pairing(
    db: &Database,
    id: &str,
    phone: &str,
    display_name: Option<&str>,
    credentials: &[u8],
) -> Result<(), HeraldError> {
    let id = id.to_string();
    let phone = phone.to_string();
    let display_name = display_name.map(|s| s.to_string());
    let credentials = credentials.to_vec();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = 'paired', phone = ?1, display_name = ?2,
                     credential_blob = ?3,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4",
                params![phone, display_name, credentials, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Drop stored credentials and reset to `not_auth`.
pub async fn clear_credentials(db: &Database, id: &str) -> Result<(), HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = 'not_auth', credential_blob = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Stamp last_used_at (called after a successful send).
pub async fn touch_last_used(db: &Database, id: &str) -> Result<(), HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET last_used_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a session record.
pub async fn delete_session(db: &Database, id: &str) -> Result<(), HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
