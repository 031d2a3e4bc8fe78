// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch worker pool and claim reaper.
//!
//! Workers claim `pending` items for sessions that are currently paired,
//! hand them to the session manager's send path, and record the outcome.
//! A submission bound to a session that is not paired simply never yields
//! claims; dispatch resumes automatically when the session comes back.
//!
//! The reaper returns expired claims (a crashed or aborted worker's items)
//! to `pending` on an interval and once immediately at startup.

use std::sync::Arc;
use std::time::Duration;

use herald_config::model::DispatchConfig;
use herald_core::{HeraldError, SendItem, StorageAdapter};
use herald_session::SessionManager;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Spawns and owns the worker pool.
pub struct WorkerPool;

impl WorkerPool {
    /// Start `config.worker_count` workers plus the reaper. The returned
    /// runner stops them via [`DispatchRunner::shutdown`].
    pub fn spawn(
        storage: Arc<dyn StorageAdapter>,
        manager: Arc<SessionManager>,
        config: DispatchConfig,
    ) -> DispatchRunner {
        let cancel = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(config.worker_count + 1);

        for worker in 0..config.worker_count {
            tasks.push(tokio::spawn(worker_loop(
                worker,
                Arc::clone(&storage),
                Arc::clone(&manager),
                config.clone(),
                cancel.clone(),
            )));
        }

        tasks.push(tokio::spawn(reaper_loop(
            Arc::clone(&storage),
            config.clone(),
            cancel.clone(),
        )));

        info!(workers = config.worker_count, "dispatch pool started");

        DispatchRunner {
            cancel,
            tasks,
            grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }
}

/// Handle to a running pool.
pub struct DispatchRunner {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl DispatchRunner {
    /// Stop accepting new claims, give in-flight sends the configured grace
    /// period to finish, then abort stragglers. Never deadlocks.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        let aborts: Vec<_> = self.tasks.iter().map(|t| t.abort_handle()).collect();
        let joined = tokio::time::timeout(self.grace, futures::future::join_all(self.tasks)).await;

        match joined {
            Ok(_) => info!("dispatch pool drained"),
            Err(_) => {
                warn!("dispatch pool drain timed out, aborting in-flight work");
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    storage: Arc<dyn StorageAdapter>,
    manager: Arc<SessionManager>,
    config: DispatchConfig,
    cancel: CancellationToken,
) {
    debug!(worker, "dispatch worker started");
    let idle = Duration::from_millis(config.idle_backoff_ms);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match claim_one(&storage, &manager, &config).await {
            Ok(Some((session_id, item))) => {
                process_item(&storage, &manager, &session_id, item).await;
            }
            Ok(None) => {
                // Nothing claimable; back off rather than busy-poll.
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(idle) => {}
                }
            }
            Err(e) => {
                // Store-level failure: fatal to this cycle only.
                error!(worker, error = %e, "claim cycle failed, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(idle) => {}
                }
            }
        }
    }

    debug!(worker, "dispatch worker stopped");
}

/// Try to claim the next item across all currently paired sessions.
async fn claim_one(
    storage: &Arc<dyn StorageAdapter>,
    manager: &Arc<SessionManager>,
    config: &DispatchConfig,
) -> Result<Option<(String, SendItem)>, HeraldError> {
    for session_id in manager.paired_sessions() {
        if let Some(item) = storage
            .claim_next(&session_id, config.claim_lease_secs)
            .await?
        {
            return Ok(Some((session_id, item)));
        }
    }
    Ok(None)
}

/// Send one claimed item and record its outcome.
///
/// A failure local to one recipient never aborts sibling work: the error is
/// captured on the item and the worker moves on. A session that stopped
/// being paired between claim and send is backpressure, not a failure --
/// the item is released back to `pending`.
async fn process_item(
    storage: &Arc<dyn StorageAdapter>,
    manager: &Arc<SessionManager>,
    session_id: &str,
    item: SendItem,
) {
    match manager.send(session_id, &item.recipient, &item.content).await {
        Ok(receipt) => {
            debug!(
                session_id,
                recipient = %item.recipient,
                message_id = %receipt.message_id,
                "item sent"
            );
            if let Err(e) = storage.mark_sent(item.id).await {
                error!(item_id = item.id, error = %e, "failed to record sent outcome");
            }
        }
        Err(HeraldError::SessionNotReady { status, .. }) => {
            debug!(
                session_id,
                recipient = %item.recipient,
                %status,
                "session no longer ready, releasing claim"
            );
            if let Err(e) = storage.release_claim(item.id).await {
                error!(item_id = item.id, error = %e, "failed to release claim");
            }
        }
        Err(e) => {
            warn!(
                session_id,
                recipient = %item.recipient,
                error = %e,
                "send failed, recording outcome"
            );
            if let Err(store_err) = storage.mark_failed(item.id, &e.to_string()).await {
                error!(item_id = item.id, error = %store_err, "failed to record failure");
            }
        }
    }
}

async fn reaper_loop(
    storage: Arc<dyn StorageAdapter>,
    config: DispatchConfig,
    cancel: CancellationToken,
) {
    let interval = Duration::from_secs(config.reaper_interval_secs);

    loop {
        match storage.requeue_expired().await {
            Ok(0) => {}
            Ok(n) => info!(requeued = n, "reaper returned expired claims to pending"),
            Err(e) => warn!(error = %e, "reaper scan failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!("reaper stopped");
}
