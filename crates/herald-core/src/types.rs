// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Herald workspace.
//!
//! The status enums double as the canonical string forms stored in SQLite;
//! `Display`/`FromStr` round-trip through the snake_case names.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::HeraldError;

/// Lifecycle state of a messaging session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No credentials; pairing has not started or was revoked.
    NotAuth,
    /// A connection is open and waiting for the operator to scan a QR code.
    QrPairing,
    /// Paired and able to send.
    Paired,
    /// Connection dropped; the manager is attempting to resume.
    Disconnected,
}

/// Lifecycle state of a single send item.
///
/// `InProgress` is a transient claim state internal to the dispatch engine;
/// progress reads report it as `Pending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Sent,
    Failed,
}

impl ItemStatus {
    /// Terminal states are never mutated again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Sent | ItemStatus::Failed)
    }
}

/// Derived status of a submission. Never stored; computed from item counts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Running,
    Completed,
}

/// A messaging session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub description: String,
    pub status: SessionStatus,
    /// Phone number of the paired device, once known.
    pub phone: Option<String>,
    /// Display name of the paired account, once known.
    pub display_name: Option<String>,
    /// Opaque resumable pairing state handed back by the wire client.
    #[serde(skip_serializing, default)]
    pub credential_blob: Option<Vec<u8>>,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One bulk-send request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub session_id: String,
    pub created_at: String,
}

/// One (recipient, content) unit of work within a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendItem {
    pub id: i64,
    pub submission_id: String,
    /// Original batch order, used for claim ordering.
    pub position: i64,
    pub recipient: String,
    pub content: String,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub attempt: i64,
    /// Claim lease expiry while `in_progress`.
    pub claimed_until: Option<String>,
    pub updated_at: String,
}

/// A validated (recipient, content) pair ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundItem {
    pub recipient: String,
    pub content: String,
}

/// Aggregate item counts for one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounts {
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    /// Claimed but unfinished. Reported as pending to callers.
    pub in_progress: i64,
    pub total: i64,
}

impl ItemCounts {
    /// Derive the submission status: running while any item is open.
    pub fn status(&self) -> SubmissionStatus {
        if self.pending + self.in_progress > 0 {
            SubmissionStatus::Running
        } else {
            SubmissionStatus::Completed
        }
    }
}

/// Proof that the wire client accepted a message for delivery.
///
/// This is not an end-to-end delivery confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub accepted_at: String,
}

/// A pairing artifact issued by the wire client while a session is in
/// `qr_pairing`. Stale artifacts are replaced in place when the client
/// reissues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrArtifact {
    /// Raw payload to encode; the operator's device scans this.
    pub payload: String,
    pub issued_at: String,
}

impl QrArtifact {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            issued_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Render the artifact as a unicode half-block QR code for terminal display.
    pub fn render_terminal(&self) -> Result<String, HeraldError> {
        let code = qrcode::QrCode::new(self.payload.as_bytes())
            .map_err(|e| HeraldError::Internal(format!("QR encoding failed: {e}")))?;
        Ok(code
            .render::<qrcode::render::unicode::Dense1x2>()
            .quiet_zone(true)
            .build())
    }
}
