// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send-item queue operations: exclusive claims, outcomes, and recovery.

use herald_core::HeraldError;
use rusqlite::params;

use crate::database::{map_tr_err, now_timestamp, timestamp_after_secs, Database};
use crate::models::{ItemCounts, ItemStatus, SendItem};

const ITEM_COLUMNS: &str = "si.id, si.submission_id, si.position, si.recipient, si.content,
     si.status, si.error, si.attempt, si.claimed_until, si.updated_at";

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<SendItem> {
    let status_str: String = row.get(5)?;
    let status: ItemStatus = status_str.parse().map_err(|e: strum::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SendItem {
        id: row.get(0)?,
        submission_id: row.get(1)?,
        position: row.get(2)?,
        recipient: row.get(3)?,
        content: row.get(4)?,
        status,
        error: row.get(6)?,
        attempt: row.get(7)?,
        claimed_until: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Exclusively claim the next `pending` item bound to `session_id`.
///
/// Atomically selects the next claimable item (oldest submission first, then
/// original batch position) and flips it `pending -> in_progress` with a
/// lease, inside one transaction. The UPDATE re-checks `status = 'pending'`
/// so a claim can never be handed to two workers. Returns `None` if there is
/// nothing to claim.
pub async fn claim_next(
    db: &Database,
    session_id: &str,
    lease_secs: i64,
) -> Result<Option<SendItem>, HeraldError> {
    let session_id = session_id.to_string();
    let lease_until = timestamp_after_secs(lease_secs);
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let candidate = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {ITEM_COLUMNS}
                     FROM send_items si
                     JOIN submissions s ON s.id = si.submission_id
                     WHERE s.session_id = ?1 AND si.status = 'pending'
                     ORDER BY s.created_at ASC, s.id ASC, si.position ASC
                     LIMIT 1"
                ))?;
                stmt.query_row(params![session_id], row_to_item)
            };

            match candidate {
                Ok(item) => {
                    let updated = tx.execute(
                        "UPDATE send_items SET status = 'in_progress',
                             attempt = attempt + 1, claimed_until = ?1, updated_at = ?2
                         WHERE id = ?3 AND status = 'pending'",
                        params![lease_until, now, item.id],
                    )?;
                    tx.commit()?;

                    if updated == 1 {
                        Ok(Some(SendItem {
                            status: ItemStatus::InProgress,
                            attempt: item.attempt + 1,
                            claimed_until: Some(lease_until),
                            updated_at: now,
                            ..item
                        }))
                    } else {
                        // Lost the race; the caller simply tries again later.
                        Ok(None)
                    }
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Record a successful send. Conditional on the item still being
/// `in_progress` so a reaped-and-reclaimed item is never double-finished.
pub async fn mark_sent(db: &Database, item_id: i64) -> Result<(), HeraldError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE send_items SET status = 'sent', error = NULL, claimed_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'in_progress'",
                params![item_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a terminal per-recipient failure with the captured error.
pub async fn mark_failed(db: &Database, item_id: i64, error: &str) -> Result<(), HeraldError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE send_items SET status = 'failed', error = ?1, claimed_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = 'in_progress'",
                params![error, item_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Return a claimed item to `pending` (the session stopped being paired
/// between claim and send). The attempt counter stands.
pub async fn release(db: &Database, item_id: i64) -> Result<(), HeraldError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE send_items SET status = 'pending', claimed_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'in_progress'",
                params![item_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Return every item whose claim lease has expired to `pending`.
///
/// This is what recovers items claimed by a worker that crashed mid-send.
/// Returns the number of items requeued.
pub async fn requeue_expired(db: &Database) -> Result<u64, HeraldError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE send_items SET status = 'pending', claimed_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'in_progress'
                   AND claimed_until IS NOT NULL AND claimed_until < ?1",
                params![now],
            )?;
            Ok(updated as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// All items of a submission in batch order.
pub async fn items_for_submission(
    db: &Database,
    submission_id: &str,
) -> Result<Vec<SendItem>, HeraldError> {
    let submission_id = submission_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM send_items si
                 WHERE si.submission_id = ?1 ORDER BY si.position ASC"
            ))?;
            let rows = stmt.query_map(params![submission_id], row_to_item)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(map_tr_err)
}

/// Aggregate item counts for one submission in a single scan.
pub async fn counts_for_submission(
    db: &Database,
    submission_id: &str,
) -> Result<ItemCounts, HeraldError> {
    let submission_id = submission_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM send_items
                 WHERE submission_id = ?1 GROUP BY status",
            )?;
            let rows = stmt.query_map(params![submission_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut counts = ItemCounts::default();
            for row in rows {
                let (status, count) = row?;
                match status.as_str() {
                    "sent" => counts.sent = count,
                    "failed" => counts.failed = count,
                    "pending" => counts.pending = count,
                    "in_progress" => counts.in_progress = count,
                    _ => {}
                }
                counts.total += count;
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}
