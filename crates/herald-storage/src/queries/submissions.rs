// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Submission intake and lookup.

use herald_core::HeraldError;
use rusqlite::params;

use crate::database::{map_tr_err, now_timestamp, Database};
use crate::models::{OutboundItem, Submission};

/// Persist a submission and all of its send items in one transaction.
///
/// Item positions follow the slice order, preserving the operator's batch
/// order for claim sequencing.
pub async fn create_submission(
    db: &Database,
    submission: &Submission,
    items: &[OutboundItem],
) -> Result<(), HeraldError> {
    let submission = submission.clone();
    let items = items.to_vec();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO submissions (id, session_id, created_at) VALUES (?1, ?2, ?3)",
                params![submission.id, submission.session_id, submission.created_at],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO send_items
                         (submission_id, position, recipient, content, status, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                )?;
                for (position, item) in items.iter().enumerate() {
                    stmt.execute(params![
                        submission.id,
                        position as i64,
                        item.recipient,
                        item.content,
                        now,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a submission by ID.
pub async fn get_submission(db: &Database, id: &str) -> Result<Option<Submission>, HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, session_id, created_at FROM submissions WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Submission {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            );
            match result {
                Ok(submission) => Ok(Some(submission)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List the most recent submissions, newest first.
pub async fn list_recent(db: &Database, limit: i64) -> Result<Vec<Submission>, HeraldError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, created_at FROM submissions
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(Submission {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            let mut submissions = Vec::new();
            for row in rows {
                submissions.push(row?);
            }
            Ok(submissions)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::sessions;
    use crate::models::{Session, SessionStatus};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let session = Session {
            id: "sess-1".to_string(),
            description: "test".to_string(),
            status: SessionStatus::Paired,
            phone: None,
            display_name: None,
            credential_blob: None,
            last_used_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        sessions::create_session(&db, &session).await.unwrap();
        (db, dir)
    }

    fn make_items(n: usize) -> Vec<OutboundItem> {
        (0..n)
            .map(|i| OutboundItem {
                recipient: format!("100{i}"),
                content: format!("message {i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn create_submission_persists_items_in_order() {
        let (db, _dir) = setup_db().await;
        let submission = Submission {
            id: "sub-1".to_string(),
            session_id: "sess-1".to_string(),
            created_at: now_timestamp(),
        };
        create_submission(&db, &submission, &make_items(3))
            .await
            .unwrap();

        let items = crate::queries::send_items::items_for_submission(&db, "sub-1")
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].position, 0);
        assert_eq!(items[0].recipient, "1000");
        assert_eq!(items[2].position, 2);
        assert_eq!(items[2].content, "message 2");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_recipient_in_submission_is_rejected_by_schema() {
        let (db, _dir) = setup_db().await;
        let submission = Submission {
            id: "sub-dup".to_string(),
            session_id: "sess-1".to_string(),
            created_at: now_timestamp(),
        };
        let items = vec![
            OutboundItem {
                recipient: "111".into(),
                content: "a".into(),
            },
            OutboundItem {
                recipient: "111".into(),
                content: "b".into(),
            },
        ];

        // The dedup stage prevents this upstream; the UNIQUE constraint is the
        // last line of defense and must roll back the whole transaction.
        let result = create_submission(&db, &submission, &items).await;
        assert!(result.is_err());
        assert!(get_submission(&db, "sub-dup").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_submission_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_submission(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first() {
        let (db, _dir) = setup_db().await;
        for (i, created) in [
            ("sub-a", "2026-01-01T00:00:00.000Z"),
            ("sub-b", "2026-01-02T00:00:00.000Z"),
        ] {
            let submission = Submission {
                id: i.to_string(),
                session_id: "sess-1".to_string(),
                created_at: created.to_string(),
            };
            create_submission(&db, &submission, &make_items(1))
                .await
                .unwrap();
        }

        let recent = list_recent(&db, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "sub-b");

        db.close().await.unwrap();
    }
}
