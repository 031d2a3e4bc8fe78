// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the bulk dispatch engine.

use std::time::Duration;

use herald_core::{HeraldError, ItemStatus, OutboundItem, StorageAdapter, SubmissionStatus};
use herald_dispatch::RejectReason;
use herald_test_utils::TestHarness;

fn batch(pairs: &[(&str, &str)]) -> Vec<OutboundItem> {
    pairs
        .iter()
        .map(|(recipient, content)| OutboundItem {
            recipient: recipient.to_string(),
            content: content.to_string(),
        })
        .collect()
}

#[tokio::test]
async fn submit_persists_deduplicated_batch() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session_id = harness.create_paired_session().await.unwrap();

    // Last duplicate wins: 111 keeps content "C".
    let outcome = harness
        .dispatcher
        .submit(&session_id, batch(&[("111", "A"), ("222", "B"), ("111", "C")]))
        .await
        .unwrap();

    assert_eq!(outcome.accepted, 2);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].reason, RejectReason::SupersededByDuplicate);

    let progress = harness
        .dispatcher
        .progress(&outcome.submission_id)
        .await
        .unwrap();
    assert_eq!(progress.total, 2);
    assert_eq!(progress.items.len(), 2);
    assert_eq!(progress.items[0].recipient, "111");
    assert_eq!(progress.items[1].recipient, "222");

    let items = harness
        .storage
        .items_for_submission(&outcome.submission_id)
        .await
        .unwrap();
    assert_eq!(items[0].content, "C");
    assert_eq!(items[1].content, "B");
}

#[tokio::test]
async fn submit_rejects_empty_batch_persisting_nothing() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session_id = harness.create_paired_session().await.unwrap();

    let err = harness
        .dispatcher
        .submit(&session_id, batch(&[("", "A"), ("  ", "B")]))
        .await
        .unwrap_err();
    assert!(matches!(err, HeraldError::Validation(_)));

    let recent = harness.storage.list_recent_submissions(10).await.unwrap();
    assert!(recent.is_empty());
}

#[tokio::test]
async fn submit_unknown_session_fails() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness
        .dispatcher
        .submit("ghost", batch(&[("111", "A")]))
        .await
        .unwrap_err();
    assert!(matches!(err, HeraldError::SessionNotFound { .. }));
}

#[tokio::test]
async fn workers_drain_a_submission_to_completion() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session_id = harness.create_paired_session().await.unwrap();

    let outcome = harness
        .dispatcher
        .submit(
            &session_id,
            batch(&[("111", "hi"), ("222", "hi"), ("333", "hi")]),
        )
        .await
        .unwrap();

    let runner = harness.spawn_workers();
    harness
        .wait_until_completed(&outcome.submission_id, Duration::from_secs(10))
        .await
        .unwrap();
    runner.shutdown().await;

    let progress = harness
        .dispatcher
        .progress(&outcome.submission_id)
        .await
        .unwrap();
    assert_eq!(progress.status, SubmissionStatus::Completed);
    assert_eq!(progress.sent, 3);
    assert_eq!(progress.failed, 0);
    assert_eq!(harness.wire.sent_count().await, 3);
}

#[tokio::test]
async fn per_recipient_failure_never_aborts_siblings() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session_id = harness.create_paired_session().await.unwrap();
    harness.wire.fail_recipient("333");

    let outcome = harness
        .dispatcher
        .submit(
            &session_id,
            batch(&[("111", "a"), ("222", "b"), ("333", "c"), ("444", "d")]),
        )
        .await
        .unwrap();

    let runner = harness.spawn_workers();
    harness
        .wait_until_completed(&outcome.submission_id, Duration::from_secs(10))
        .await
        .unwrap();
    runner.shutdown().await;

    let progress = harness
        .dispatcher
        .progress(&outcome.submission_id)
        .await
        .unwrap();
    assert_eq!(progress.sent, 3);
    assert_eq!(progress.failed, 1);

    let failed = progress
        .items
        .iter()
        .find(|i| i.recipient == "333")
        .unwrap();
    assert_eq!(failed.status, ItemStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("mock delivery refused"));

    for recipient in ["111", "222", "444"] {
        let item = progress.items.iter().find(|i| i.recipient == recipient).unwrap();
        assert_eq!(item.status, ItemStatus::Sent);
    }
}

#[tokio::test]
async fn unpaired_session_backpressures_until_connected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = harness.manager.create_session("offline").await.unwrap();

    // Submission against a session with no live connection: accepted, but
    // nothing must dispatch.
    let outcome = harness
        .dispatcher
        .submit(&session.id, batch(&[("111", "a"), ("222", "b")]))
        .await
        .unwrap();

    let runner = harness.spawn_workers();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let counts = harness.dispatcher.counts(&outcome.submission_id).await.unwrap();
    assert_eq!(counts.status, SubmissionStatus::Running);
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.sent + counts.failed, 0);

    // Pairing the session drains the backlog with no re-submission.
    harness.manager.connect(&session.id).await.unwrap();
    harness
        .wait_until_completed(&outcome.submission_id, Duration::from_secs(10))
        .await
        .unwrap();
    runner.shutdown().await;

    let counts = harness.dispatcher.counts(&outcome.submission_id).await.unwrap();
    assert_eq!(counts.sent, 2);
}

#[tokio::test]
async fn concurrent_workers_never_send_an_item_twice() {
    let harness = TestHarness::builder()
        .with_workers(4)
        .with_send_delay(Duration::from_millis(30))
        .build()
        .await
        .unwrap();
    let session_id = harness.create_paired_session().await.unwrap();

    let pairs: Vec<(String, String)> = (0..12)
        .map(|i| (format!("rcpt-{i}"), format!("msg-{i}")))
        .collect();
    let items: Vec<OutboundItem> = pairs
        .iter()
        .map(|(r, c)| OutboundItem {
            recipient: r.clone(),
            content: c.clone(),
        })
        .collect();

    let outcome = harness.dispatcher.submit(&session_id, items).await.unwrap();

    let runner = harness.spawn_workers();
    harness
        .wait_until_completed(&outcome.submission_id, Duration::from_secs(15))
        .await
        .unwrap();
    runner.shutdown().await;

    // Every recipient exactly once, no duplicates under contention.
    assert_eq!(harness.wire.sent_count().await, 12);
    for (recipient, _) in &pairs {
        assert_eq!(
            harness.wire.sent_count_for(recipient).await,
            1,
            "recipient {recipient} sent more than once"
        );
    }
}

#[tokio::test]
async fn progress_counts_are_monotonic_while_running() {
    let harness = TestHarness::builder()
        .with_send_delay(Duration::from_millis(20))
        .build()
        .await
        .unwrap();
    let session_id = harness.create_paired_session().await.unwrap();

    let items: Vec<OutboundItem> = (0..10)
        .map(|i| OutboundItem {
            recipient: format!("m-{i}"),
            content: "tick".to_string(),
        })
        .collect();
    let outcome = harness.dispatcher.submit(&session_id, items).await.unwrap();

    let runner = harness.spawn_workers();

    let mut last_settled = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let counts = harness.dispatcher.counts(&outcome.submission_id).await.unwrap();
        let settled = counts.sent + counts.failed;
        assert!(
            settled >= last_settled,
            "sent+failed regressed from {last_settled} to {settled}"
        );
        last_settled = settled;

        if counts.status == SubmissionStatus::Completed {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "submission never completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    runner.shutdown().await;

    assert_eq!(last_settled, 10);
}

#[tokio::test]
async fn shutdown_is_bounded_with_work_in_flight() {
    let harness = TestHarness::builder()
        .with_send_delay(Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    let session_id = harness.create_paired_session().await.unwrap();

    let items: Vec<OutboundItem> = (0..50)
        .map(|i| OutboundItem {
            recipient: format!("s-{i}"),
            content: "bulk".to_string(),
        })
        .collect();
    harness.dispatcher.submit(&session_id, items).await.unwrap();

    let runner = harness.spawn_workers();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    runner.shutdown().await;
    // Harness grace is 2s; shutdown must come back within it plus margin.
    assert!(started.elapsed() < Duration::from_secs(5));
}

mod normalize_properties {
    use herald_core::OutboundItem;
    use herald_dispatch::normalize_batch;
    use proptest::prelude::*;

    proptest! {
        /// Dedup output never contains duplicate recipients, and every input
        /// entry is accounted for as accepted or rejected.
        #[test]
        fn dedup_output_is_unique_and_complete(
            raw in proptest::collection::vec(
                ("[ ]{0,2}[0-9]{0,6}[ ]{0,2}", "[a-z]{0,8}"),
                0..40,
            )
        ) {
            let input_len = raw.len();
            let items: Vec<OutboundItem> = raw
                .into_iter()
                .map(|(recipient, content)| OutboundItem { recipient, content })
                .collect();

            let batch = normalize_batch(items);

            let mut recipients: Vec<&str> =
                batch.accepted.iter().map(|i| i.recipient.as_str()).collect();
            recipients.sort_unstable();
            let unique_before = recipients.len();
            recipients.dedup();
            prop_assert_eq!(unique_before, recipients.len());

            prop_assert!(batch.accepted.iter().all(|i| !i.recipient.trim().is_empty()));
            prop_assert_eq!(batch.accepted.len() + batch.rejected.len(), input_len);
        }
    }
}
