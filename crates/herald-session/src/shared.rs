// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared per-session state slots.
//!
//! Written only by the session's supervisor task; read by `send`, `status`,
//! and `qr_code` callers. Plain `std` locks are sufficient because no guard
//! is ever held across an await point: readers copy or clone out and drop
//! the guard before any suspension.

use std::sync::{Arc, RwLock};

use herald_core::{QrArtifact, SessionStatus, WireConnection};

pub(crate) struct SessionShared {
    status: RwLock<SessionStatus>,
    qr: RwLock<Option<QrArtifact>>,
    connection: RwLock<Option<Arc<dyn WireConnection>>>,
}

impl SessionShared {
    pub fn new(status: SessionStatus) -> Self {
        Self {
            status: RwLock::new(status),
            qr: RwLock::new(None),
            connection: RwLock::new(None),
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.read().unwrap()
    }

    pub fn set_status(&self, status: SessionStatus) {
        *self.status.write().unwrap() = status;
    }

    /// Latest pairing artifact, only meaningful while `qr_pairing`.
    pub fn qr(&self) -> Option<QrArtifact> {
        if self.status() == SessionStatus::QrPairing {
            self.qr.read().unwrap().clone()
        } else {
            None
        }
    }

    pub fn set_qr(&self, artifact: Option<QrArtifact>) {
        *self.qr.write().unwrap() = artifact;
    }

    /// Clone out the live connection handle. The caller awaits the send
    /// round-trip after the guard is dropped, so a slow send never blocks
    /// the supervisor or other callers.
    pub fn connection(&self) -> Option<Arc<dyn WireConnection>> {
        self.connection.read().unwrap().clone()
    }

    pub fn set_connection(&self, conn: Option<Arc<dyn WireConnection>>) {
        *self.connection.write().unwrap() = conn;
    }

    pub fn take_connection(&self) -> Option<Arc<dyn WireConnection>> {
        self.connection.write().unwrap().take()
    }
}
