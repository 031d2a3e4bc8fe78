// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Herald pipeline.
//!
//! Each test creates an isolated harness (temp SQLite, mock wire connector)
//! or a fresh stack over the same database to simulate a process restart.
//! Tests are independent and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use herald_config::model::StorageConfig;
use herald_core::{OutboundItem, SessionStatus, StorageAdapter, SubmissionStatus, WireConnector};
use herald_dispatch::{Dispatcher, WorkerPool};
use herald_loopback::LoopbackConnector;
use herald_session::SessionManager;
use herald_storage::SqliteStorage;
use herald_test_utils::TestHarness;

fn items(n: usize) -> Vec<OutboundItem> {
    (0..n)
        .map(|i| OutboundItem {
            recipient: format!("rcpt-{i}"),
            content: format!("msg-{i}"),
        })
        .collect()
}

// ---- Resume after restart ----

#[tokio::test]
async fn claimed_items_survive_a_worker_process_restart() {
    let harness = TestHarness::builder()
        .with_claim_lease_secs(1)
        .build()
        .await
        .unwrap();
    let session_id = harness.create_paired_session().await.unwrap();

    let outcome = harness
        .dispatcher
        .submit(&session_id, items(5))
        .await
        .unwrap();

    // Two workers claim items and then crash before sending: the claims
    // stay in_progress with a short lease and no outcome.
    let a = harness
        .storage
        .claim_next(&session_id, 1)
        .await
        .unwrap()
        .unwrap();
    let b = harness
        .storage
        .claim_next(&session_id, 1)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(a.id, b.id);

    // The old process dies: connections drop, claims stay behind.
    harness.manager.remove_all_connections().await;

    // Leases expire while the process is down.
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // Restart: a fresh storage handle, manager, and pool over the same
    // database file. The startup reaper pass recovers the stale claims.
    let storage = SqliteStorage::new(StorageConfig {
        database_path: harness.db_path.clone(),
        wal_mode: true,
    });
    storage.initialize().await.unwrap();
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let requeued = storage.requeue_expired().await.unwrap();
    assert_eq!(requeued, 2);

    let manager = Arc::new(SessionManager::new(
        Arc::clone(&storage),
        Arc::new(harness.wire.clone()),
        harness.connection_config.clone(),
    ));
    manager.restore_sessions().await.unwrap();

    let runner = WorkerPool::spawn(
        Arc::clone(&storage),
        Arc::clone(&manager),
        harness.dispatch_config.clone(),
    );

    let dispatcher = Dispatcher::new(Arc::clone(&storage));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let counts = dispatcher.counts(&outcome.submission_id).await.unwrap();
        if counts.status == SubmissionStatus::Completed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "submission never completed after restart"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    runner.shutdown().await;
    manager.remove_all_connections().await;

    // All five delivered, none twice, despite the crash.
    let counts = dispatcher.counts(&outcome.submission_id).await.unwrap();
    assert_eq!(counts.sent, 5);
    assert_eq!(harness.wire.sent_count().await, 5);
    for i in 0..5 {
        assert_eq!(harness.wire.sent_count_for(&format!("rcpt-{i}")).await, 1);
    }
}

// ---- Cross-session independence ----

#[tokio::test]
async fn paired_session_drains_while_unpaired_session_waits() {
    let harness = TestHarness::builder().build().await.unwrap();
    let live_id = harness.create_paired_session().await.unwrap();
    let cold = harness.manager.create_session("cold").await.unwrap();

    let live_sub = harness
        .dispatcher
        .submit(&live_id, items(3))
        .await
        .unwrap();
    let cold_sub = harness
        .dispatcher
        .submit(&cold.id, items(3))
        .await
        .unwrap();

    let runner = harness.spawn_workers();
    harness
        .wait_until_completed(&live_sub.submission_id, Duration::from_secs(10))
        .await
        .unwrap();

    // The cold session's batch is untouched backpressure, not failure.
    let cold_counts = harness
        .dispatcher
        .counts(&cold_sub.submission_id)
        .await
        .unwrap();
    assert_eq!(cold_counts.status, SubmissionStatus::Running);
    assert_eq!(cold_counts.pending, 3);
    assert_eq!(cold_counts.sent + cold_counts.failed, 0);

    // Pairing the cold session drains it with no re-submission.
    harness.manager.connect(&cold.id).await.unwrap();
    harness
        .wait_until_completed(&cold_sub.submission_id, Duration::from_secs(10))
        .await
        .unwrap();
    runner.shutdown().await;
}

// ---- Full lifecycle over the loopback connector ----

#[tokio::test]
async fn loopback_connector_runs_the_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("loopback.db");

    let storage = SqliteStorage::new(StorageConfig {
        database_path: db_path.to_string_lossy().to_string(),
        wal_mode: true,
    });
    storage.initialize().await.unwrap();
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let connector: Arc<dyn WireConnector> = Arc::new(LoopbackConnector::new());
    let manager = Arc::new(SessionManager::new(
        Arc::clone(&storage),
        connector,
        herald_config::model::ConnectionConfig::default(),
    ));

    let session = manager.create_session("loopback demo").await.unwrap();
    manager.connect(&session.id).await.unwrap();

    // The loopback issues a QR first, then self-pairs.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut saw_qr = false;
    loop {
        match manager.status(&session.id).await.unwrap() {
            SessionStatus::QrPairing => {
                saw_qr = true;
                let artifact = manager.qr_code(&session.id).await.unwrap().unwrap();
                assert!(artifact.payload.starts_with("loopback://"));
                assert!(artifact.render_terminal().is_ok());
            }
            SessionStatus::Paired => break,
            _ => {}
        }
        assert!(tokio::time::Instant::now() < deadline, "never paired");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(saw_qr, "pairing never passed through qr_pairing");

    let dispatcher = Dispatcher::new(Arc::clone(&storage));
    let outcome = dispatcher.submit(&session.id, items(4)).await.unwrap();

    let dispatch_config = herald_config::model::DispatchConfig {
        worker_count: 2,
        idle_backoff_ms: 25,
        ..Default::default()
    };
    let runner = WorkerPool::spawn(Arc::clone(&storage), Arc::clone(&manager), dispatch_config);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let counts = dispatcher.counts(&outcome.submission_id).await.unwrap();
        if counts.status == SubmissionStatus::Completed {
            assert_eq!(counts.sent, 4);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "never completed");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    runner.shutdown().await;
    manager.remove_all_connections().await;
    storage.close().await.unwrap();
}
