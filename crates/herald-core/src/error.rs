// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Herald dispatch engine.

use thiserror::Error;

use crate::types::SessionStatus;

/// The primary error type used across all Herald components.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The underlying wire client could not establish or resume a connection.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A send was attempted while the session is not paired.
    #[error("session {session_id} is not ready to send (status: {status})")]
    SessionNotReady {
        session_id: String,
        status: SessionStatus,
    },

    /// The referenced session does not exist.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// The referenced submission does not exist.
    #[error("submission not found: {submission_id}")]
    SubmissionNotFound { submission_id: String },

    /// A submission was rejected before anything was persisted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The wire client accepted the connection but refused this message.
    /// Captured on the send item, never escalated to abort the batch.
    #[error("send failure: {message}")]
    Send {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HeraldError {
    /// True for errors the dispatch path records on the item rather than
    /// releasing it back to the queue.
    pub fn is_send_failure(&self) -> bool {
        matches!(self, HeraldError::Send { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_ready_names_status() {
        let err = HeraldError::SessionNotReady {
            session_id: "s-1".into(),
            status: SessionStatus::Disconnected,
        };
        let msg = err.to_string();
        assert!(msg.contains("s-1"));
        assert!(msg.contains("disconnected"));
    }

    #[test]
    fn send_failure_classification() {
        let send = HeraldError::Send {
            message: "recipient refused".into(),
            source: None,
        };
        assert!(send.is_send_failure());

        let not_ready = HeraldError::SessionNotReady {
            session_id: "s-1".into(),
            status: SessionStatus::NotAuth,
        };
        assert!(!not_ready.is_send_failure());
    }
}
