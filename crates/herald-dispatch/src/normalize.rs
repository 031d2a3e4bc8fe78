// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient normalization and deduplication.
//!
//! Pure, stateless batch preparation. Recipients arrive already normalized to
//! canonical identifiers by the intake layer; this stage trims whitespace,
//! rejects empties, and collapses duplicates. When the same recipient appears
//! more than once, the last occurrence's content wins (a corrected later
//! entry supersedes an earlier one) while the first occurrence's position is
//! kept, so dispatch order still follows the operator's batch order.
//!
//! Rejections never abort the batch and are always reported, never silently
//! dropped.

use std::collections::HashMap;

use herald_core::OutboundItem;

/// Why an entry was excluded from the accepted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Recipient was empty after trimming.
    EmptyRecipient,
    /// A later entry for the same recipient superseded this one.
    SupersededByDuplicate,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyRecipient => write!(f, "empty recipient"),
            RejectReason::SupersededByDuplicate => {
                write!(f, "superseded by a later entry for the same recipient")
            }
        }
    }
}

/// One excluded entry, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedItem {
    pub recipient: String,
    /// Index of the entry in the raw batch.
    pub position: usize,
    pub reason: RejectReason,
}

/// Result of normalizing one raw batch.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub accepted: Vec<OutboundItem>,
    pub rejected: Vec<RejectedItem>,
}

/// Validate and deduplicate a raw batch.
pub fn normalize_batch(raw: Vec<OutboundItem>) -> NormalizedBatch {
    let mut accepted: Vec<OutboundItem> = Vec::new();
    // Raw-batch position of each accepted entry, parallel to `accepted`.
    let mut accepted_positions: Vec<usize> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut rejected: Vec<RejectedItem> = Vec::new();

    for (position, item) in raw.into_iter().enumerate() {
        let recipient = item.recipient.trim().to_string();
        if recipient.is_empty() {
            rejected.push(RejectedItem {
                recipient: item.recipient,
                position,
                reason: RejectReason::EmptyRecipient,
            });
            continue;
        }

        match index_of.get(&recipient) {
            Some(&idx) => {
                // Last occurrence wins: report the superseded earlier entry
                // and replace its content in place.
                rejected.push(RejectedItem {
                    recipient: recipient.clone(),
                    position: accepted_positions[idx],
                    reason: RejectReason::SupersededByDuplicate,
                });
                accepted[idx].content = item.content;
                accepted_positions[idx] = position;
            }
            None => {
                index_of.insert(recipient.clone(), accepted.len());
                accepted_positions.push(position);
                accepted.push(OutboundItem {
                    recipient,
                    content: item.content,
                });
            }
        }
    }

    NormalizedBatch { accepted, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(recipient: &str, content: &str) -> OutboundItem {
        OutboundItem {
            recipient: recipient.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn last_duplicate_wins_keeping_first_position() {
        let batch = normalize_batch(vec![
            item("111", "A"),
            item("222", "B"),
            item("111", "C"),
        ]);

        assert_eq!(batch.accepted.len(), 2);
        assert_eq!(batch.accepted[0].recipient, "111");
        assert_eq!(batch.accepted[0].content, "C");
        assert_eq!(batch.accepted[1].recipient, "222");
        assert_eq!(batch.accepted[1].content, "B");

        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].recipient, "111");
        assert_eq!(batch.rejected[0].position, 0);
        assert_eq!(batch.rejected[0].reason, RejectReason::SupersededByDuplicate);
    }

    #[test]
    fn empty_recipients_are_rejected_not_dropped() {
        let batch = normalize_batch(vec![item("", "A"), item("  ", "B"), item("333", "C")]);

        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.accepted[0].recipient, "333");
        assert_eq!(batch.rejected.len(), 2);
        assert!(batch
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::EmptyRecipient));
    }

    #[test]
    fn whitespace_is_trimmed_before_dedup() {
        let batch = normalize_batch(vec![item(" 111", "A"), item("111 ", "B")]);

        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.accepted[0].recipient, "111");
        assert_eq!(batch.accepted[0].content, "B");
        assert_eq!(batch.rejected.len(), 1);
    }

    #[test]
    fn triple_duplicate_keeps_only_final_content() {
        let batch = normalize_batch(vec![
            item("111", "A"),
            item("111", "B"),
            item("111", "C"),
        ]);

        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.accepted[0].content, "C");
        assert_eq!(batch.rejected.len(), 2);
        // Positions 0 and 1 were both superseded.
        let positions: Vec<usize> = batch.rejected.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn empty_batch_yields_empty_result() {
        let batch = normalize_batch(vec![]);
        assert!(batch.accepted.is_empty());
        assert!(batch.rejected.is_empty());
    }

    #[test]
    fn order_of_first_appearance_is_preserved() {
        let batch = normalize_batch(vec![
            item("333", "x"),
            item("111", "y"),
            item("222", "z"),
            item("111", "y2"),
        ]);
        let recipients: Vec<&str> =
            batch.accepted.iter().map(|i| i.recipient.as_str()).collect();
        assert_eq!(recipients, vec!["333", "111", "222"]);
    }
}
