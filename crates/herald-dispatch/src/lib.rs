// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk dispatch engine for Herald.
//!
//! Takes a batch of (recipient, content) pairs through validation and dedup,
//! persists it as a submission with per-recipient send items, drives the
//! items through the session manager's send path with a bounded worker pool,
//! and answers progress polls from durable state.

pub mod dispatcher;
pub mod normalize;
pub mod worker;

pub use dispatcher::{Dispatcher, ItemProgress, ProgressCounts, SubmissionProgress, SubmitOutcome};
pub use normalize::{normalize_batch, NormalizedBatch, RejectReason, RejectedItem};
pub use worker::{DispatchRunner, WorkerPool};
