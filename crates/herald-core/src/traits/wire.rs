// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seam for the external messaging client library.
//!
//! Herald does not implement the wire protocol. The embedder supplies a
//! [`WireConnector`] which opens one live connection per session and reports
//! pairing and connection-state changes through an event channel. The session
//! manager is the only consumer of these traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::HeraldError;
use crate::types::SendReceipt;

/// Connection-state and pairing events emitted by the wire client.
///
/// Events may arrive out of order relative to manager-issued commands (for
/// example a `ConnectionLost` delivered after teardown has begun); consumers
/// must tolerate and drop late events rather than double-process them.
#[derive(Debug, Clone)]
pub enum WireEvent {
    /// The client wants the operator to scan a pairing QR code. A fresh
    /// `QrIssued` while already pairing replaces the previous artifact.
    QrIssued { payload: String },
    /// Authentication succeeded: fresh pairing finished or an existing
    /// pairing was resumed. Emitted once per successful open; `credentials`
    /// is the opaque blob that allows the session to be resumed later
    /// without re-pairing (clients may rotate it on every authentication).
    PairingComplete {
        phone: String,
        display_name: Option<String>,
        credentials: Vec<u8>,
    },
    /// The underlying connection dropped.
    ConnectionLost { reason: String },
    /// The remote side revoked the pairing. Stored credentials are no longer
    /// valid.
    LoggedOut,
}

/// A live connection: a send handle plus the event stream for its lifetime.
///
/// The event receiver is owned by exactly one consumer (the per-session
/// supervisor); the send handle may be cloned and used concurrently.
pub struct WireLink {
    pub connection: Arc<dyn WireConnection>,
    pub events: mpsc::Receiver<WireEvent>,
}

impl std::fmt::Debug for WireLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireLink").finish_non_exhaustive()
    }
}

/// Factory for live connections, implemented by the embedder's client library.
#[async_trait]
pub trait WireConnector: Send + Sync + 'static {
    /// Open a connection for `session_id`. With `credentials` the client
    /// attempts to resume the existing pairing; without, it starts fresh
    /// pairing and will emit [`WireEvent::QrIssued`].
    ///
    /// Fails with [`HeraldError::Connection`] if the client cannot be
    /// instantiated (e.g. resource exhaustion).
    async fn open(
        &self,
        session_id: &str,
        credentials: Option<Vec<u8>>,
    ) -> Result<WireLink, HeraldError>;
}

/// The send/close surface of one live connection.
#[async_trait]
pub trait WireConnection: Send + Sync {
    /// Hand one message to the client for delivery. Must not return `Ok`
    /// unless the client accepted the message; acceptance is not end-to-end
    /// delivery confirmation.
    async fn send(&self, recipient: &str, content: &str) -> Result<SendReceipt, HeraldError>;

    /// Tear down the connection. Idempotent.
    async fn close(&self) -> Result<(), HeraldError>;
}
