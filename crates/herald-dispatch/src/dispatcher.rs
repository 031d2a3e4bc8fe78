// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Submission intake and progress reporting.
//!
//! `submit` and `progress` together implement the poll-based progress
//! pattern: submit returns immediately once the batch is durably persisted,
//! and progress reads only durably committed state, so a poll after a
//! process restart still reports correctly.

use std::sync::Arc;

use herald_core::{
    HeraldError, ItemStatus, OutboundItem, StorageAdapter, Submission, SubmissionStatus,
};
use serde::Serialize;
use tracing::info;

use crate::normalize::{normalize_batch, RejectedItem};

/// Outcome of a submission: what was persisted and what was excluded.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub submission_id: String,
    pub accepted: usize,
    pub rejected: Vec<RejectedItem>,
}

/// Externally visible progress of one item. Claimed-but-unfinished items are
/// reported as `pending`.
#[derive(Debug, Clone, Serialize)]
pub struct ItemProgress {
    pub recipient: String,
    pub status: ItemStatus,
    pub error: Option<String>,
}

/// Full progress report for one submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionProgress {
    pub submission_id: String,
    pub session_id: String,
    pub status: SubmissionStatus,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    pub total: i64,
    pub items: Vec<ItemProgress>,
}

/// Aggregate-only progress, cheap enough to poll frequently.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressCounts {
    pub status: SubmissionStatus,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    pub total: i64,
}

/// Accepts bulk-send requests and answers progress polls.
pub struct Dispatcher {
    storage: Arc<dyn StorageAdapter>,
}

impl Dispatcher {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Validate, deduplicate, and durably persist one batch. Returns as soon
    /// as the submission and all of its items are committed; dispatch happens
    /// asynchronously in the worker pool.
    ///
    /// Fails with `Validation` (persisting nothing) if the batch is empty
    /// after dedup, and `SessionNotFound` for an unknown session.
    pub async fn submit(
        &self,
        session_id: &str,
        items: Vec<OutboundItem>,
    ) -> Result<SubmitOutcome, HeraldError> {
        let batch = normalize_batch(items);
        if batch.accepted.is_empty() {
            return Err(HeraldError::Validation(
                "submission contains no valid recipients after dedup".to_string(),
            ));
        }

        self.storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| HeraldError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        let submission = Submission {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        self.storage
            .create_submission(&submission, &batch.accepted)
            .await?;

        info!(
            submission_id = %submission.id,
            session_id,
            accepted = batch.accepted.len(),
            rejected = batch.rejected.len(),
            "submission accepted"
        );

        Ok(SubmitOutcome {
            submission_id: submission.id,
            accepted: batch.accepted.len(),
            rejected: batch.rejected,
        })
    }

    /// Full per-item progress. Safe to poll; reads only durable state.
    pub async fn progress(&self, submission_id: &str) -> Result<SubmissionProgress, HeraldError> {
        let submission = self.require_submission(submission_id).await?;
        let counts = self.storage.counts_for_submission(submission_id).await?;
        let items = self.storage.items_for_submission(submission_id).await?;

        let items = items
            .into_iter()
            .map(|item| ItemProgress {
                recipient: item.recipient,
                status: external_status(item.status),
                error: item.error,
            })
            .collect();

        Ok(SubmissionProgress {
            submission_id: submission.id,
            session_id: submission.session_id,
            status: counts.status(),
            sent: counts.sent,
            failed: counts.failed,
            pending: counts.pending + counts.in_progress,
            total: counts.total,
            items,
        })
    }

    /// Aggregate counts without the item list, for tight polling loops.
    pub async fn counts(&self, submission_id: &str) -> Result<ProgressCounts, HeraldError> {
        self.require_submission(submission_id).await?;
        let counts = self.storage.counts_for_submission(submission_id).await?;
        Ok(ProgressCounts {
            status: counts.status(),
            sent: counts.sent,
            failed: counts.failed,
            pending: counts.pending + counts.in_progress,
            total: counts.total,
        })
    }

    async fn require_submission(&self, submission_id: &str) -> Result<Submission, HeraldError> {
        self.storage
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| HeraldError::SubmissionNotFound {
                submission_id: submission_id.to_string(),
            })
    }
}

/// Collapse the internal claim state for external reporting.
fn external_status(status: ItemStatus) -> ItemStatus {
    match status {
        ItemStatus::InProgress => ItemStatus::Pending,
        other => other,
    }
}
