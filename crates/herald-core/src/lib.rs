// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Herald dispatch engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Herald workspace: the error taxonomy, the
//! session/submission/send-item data model, the [`WireConnector`] seam to the
//! external messaging client, and the [`StorageAdapter`] seam to the durable
//! store.

pub mod error;
pub mod traits;
pub mod types;

pub use error::HeraldError;
pub use types::{
    ItemCounts, ItemStatus, OutboundItem, QrArtifact, SendItem, SendReceipt, Session,
    SessionStatus, Submission, SubmissionStatus,
};

pub use traits::{StorageAdapter, WireConnection, WireConnector, WireEvent, WireLink};
