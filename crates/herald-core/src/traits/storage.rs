// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.
//!
//! The durable store is the single source of truth: the session manager, the
//! dispatch workers, and progress polling all communicate through it rather
//! than through in-memory handoff, so recovery after a restart is correct by
//! construction.

use async_trait::async_trait;

use crate::error::HeraldError;
use crate::types::{ItemCounts, OutboundItem, SendItem, Session, SessionStatus, Submission};

/// Adapter for the durable session/submission/send-item store.
///
/// Every operation is atomic at least at the single-row level; `claim_next`
/// is a compare-and-swap (claim only while still `pending`).
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Initializes the backend (connection, migrations).
    async fn initialize(&self) -> Result<(), HeraldError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), HeraldError>;

    // --- Sessions ---

    async fn create_session(&self, session: &Session) -> Result<(), HeraldError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, HeraldError>;

    async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, HeraldError>;

    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<(), HeraldError>;

    /// Persist pairing identity, credentials, and the `paired` status in one
    /// write.
    async fn record_pairing(
        &self,
        id: &str,
        phone: &str,
        display_name: Option<&str>,
        credentials: &[u8],
    ) -> Result<(), HeraldError>;

    /// Drop stored credentials and reset to `not_auth` (resume exhausted or
    /// remote logout).
    async fn clear_credentials(&self, id: &str) -> Result<(), HeraldError>;

    async fn touch_last_used(&self, id: &str) -> Result<(), HeraldError>;

    async fn delete_session(&self, id: &str) -> Result<(), HeraldError>;

    // --- Submissions ---

    /// Persist a submission and all of its items in one transaction. Item
    /// positions follow the slice order.
    async fn create_submission(
        &self,
        submission: &Submission,
        items: &[OutboundItem],
    ) -> Result<(), HeraldError>;

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>, HeraldError>;

    async fn list_recent_submissions(&self, limit: i64) -> Result<Vec<Submission>, HeraldError>;

    // --- Send items (the job queue) ---

    /// Exclusively claim the next `pending` item bound to `session_id`:
    /// oldest submission first, then batch position. The claim transitions
    /// the item to `in_progress` with a lease of `lease_secs`, incrementing
    /// its attempt counter. Returns `None` when nothing is claimable.
    async fn claim_next(
        &self,
        session_id: &str,
        lease_secs: i64,
    ) -> Result<Option<SendItem>, HeraldError>;

    /// Record a successful send. No-op unless the item is still `in_progress`
    /// (a reaped-and-reclaimed item must not be double-finished).
    async fn mark_sent(&self, item_id: i64) -> Result<(), HeraldError>;

    /// Record a terminal per-recipient failure with the captured error.
    async fn mark_failed(&self, item_id: i64, error: &str) -> Result<(), HeraldError>;

    /// Return a claimed item to `pending` (the session stopped being paired
    /// between claim and send). Not a failure; the attempt stands.
    async fn release_claim(&self, item_id: i64) -> Result<(), HeraldError>;

    /// Return every item whose claim lease has expired to `pending`. Run
    /// periodically and once at startup; this is what recovers items claimed
    /// by a crashed worker. Returns the number of items requeued.
    async fn requeue_expired(&self) -> Result<u64, HeraldError>;

    async fn items_for_submission(
        &self,
        submission_id: &str,
    ) -> Result<Vec<SendItem>, HeraldError>;

    async fn counts_for_submission(
        &self,
        submission_id: &str,
    ) -> Result<ItemCounts, HeraldError>;
}
