// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session supervisor: the single writer for one session's state.
//!
//! Each connected session runs exactly one supervisor task. It owns the
//! event half of the [`WireLink`], translates wire events into state
//! transitions (persisted through storage and mirrored into the shared
//! in-memory slots), and drives the bounded resume loop after a connection
//! loss. Cancellation wins over any pending event, so events arriving after
//! teardown has begun are dropped rather than double-processed.

use std::sync::Arc;
use std::time::Duration;

use herald_config::model::ConnectionConfig;
use herald_core::{
    HeraldError, QrArtifact, SessionStatus, StorageAdapter, WireConnector, WireEvent, WireLink,
};
use rand::Rng;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shared::SessionShared;

/// Everything a supervisor needs, bundled for the spawned task.
pub(crate) struct SupervisorCtx {
    pub session_id: String,
    pub storage: Arc<dyn StorageAdapter>,
    pub connector: Arc<dyn WireConnector>,
    pub config: ConnectionConfig,
    pub shared: Arc<SessionShared>,
    pub cancel: CancellationToken,
    /// Called on exit so the manager's registry drops this session.
    pub on_exit: Box<dyn FnOnce() + Send + Sync>,
}

enum ResumeOutcome {
    Resumed(WireLink),
    Exhausted,
    Cancelled,
}

/// Run the supervisor until logout, resume exhaustion, or cancellation.
///
/// The result of the initial `open` is reported through `ready_tx` so that
/// `connect` can surface a synchronous `Connection` error.
pub(crate) async fn run(
    ctx: SupervisorCtx,
    initial_credentials: Option<Vec<u8>>,
    ready_tx: oneshot::Sender<Result<(), HeraldError>>,
) {
    let mut credentials = initial_credentials;

    let link = match ctx
        .connector
        .open(&ctx.session_id, credentials.clone())
        .await
    {
        Ok(link) => {
            let _ = ready_tx.send(Ok(()));
            link
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            (ctx.on_exit)();
            return;
        }
    };

    ctx.shared.set_connection(Some(link.connection));
    let mut events = link.events;

    info!(session_id = %ctx.session_id, "session supervisor started");

    loop {
        tokio::select! {
            // Cancellation wins over any pending event: a disconnect arriving
            // after teardown has begun is dropped, not double-processed.
            biased;
            _ = ctx.cancel.cancelled() => {
                debug!(session_id = %ctx.session_id, "supervisor cancelled");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(WireEvent::QrIssued { payload }) => {
                        handle_qr_issued(&ctx, payload).await;
                    }
                    Some(WireEvent::PairingComplete { phone, display_name, credentials: blob }) => {
                        credentials = Some(blob.clone());
                        handle_pairing_complete(&ctx, &phone, display_name.as_deref(), &blob).await;
                    }
                    Some(WireEvent::LoggedOut) => {
                        info!(session_id = %ctx.session_id, "remote logout, credentials revoked");
                        ctx.shared.set_qr(None);
                        transition(&ctx, SessionStatus::NotAuth).await;
                        if let Err(e) = ctx.storage.clear_credentials(&ctx.session_id).await {
                            warn!(session_id = %ctx.session_id, error = %e,
                                "failed to clear credentials after logout");
                        }
                        break;
                    }
                    Some(WireEvent::ConnectionLost { reason }) => {
                        warn!(session_id = %ctx.session_id, reason, "connection lost");
                        match handle_connection_lost(&ctx, &credentials).await {
                            ResumeOutcome::Resumed(new_link) => {
                                ctx.shared.set_connection(Some(new_link.connection));
                                events = new_link.events;
                            }
                            ResumeOutcome::Exhausted => break,
                            ResumeOutcome::Cancelled => break,
                        }
                    }
                    None => {
                        // The client dropped its event sender without a
                        // ConnectionLost; treat it the same way.
                        warn!(session_id = %ctx.session_id, "event channel closed by client");
                        match handle_connection_lost(&ctx, &credentials).await {
                            ResumeOutcome::Resumed(new_link) => {
                                ctx.shared.set_connection(Some(new_link.connection));
                                events = new_link.events;
                            }
                            ResumeOutcome::Exhausted => break,
                            ResumeOutcome::Cancelled => break,
                        }
                    }
                }
            }
        }
    }

    close_connection(&ctx).await;
    (ctx.on_exit)();
    info!(session_id = %ctx.session_id, "session supervisor stopped");
}

async fn handle_qr_issued(ctx: &SupervisorCtx, payload: String) {
    let artifact = QrArtifact::new(payload);
    let already_pairing = ctx.shared.status() == SessionStatus::QrPairing;
    ctx.shared.set_qr(Some(artifact));

    if already_pairing {
        // Stale QR regenerated; artifact replaced, state unchanged.
        debug!(session_id = %ctx.session_id, "pairing QR refreshed");
    } else {
        transition(ctx, SessionStatus::QrPairing).await;
    }
}

async fn handle_pairing_complete(
    ctx: &SupervisorCtx,
    phone: &str,
    display_name: Option<&str>,
    credentials: &[u8],
) {
    ctx.shared.set_qr(None);
    ctx.shared.set_status(SessionStatus::Paired);
    info!(session_id = %ctx.session_id, phone, "session paired");

    if let Err(e) = ctx
        .storage
        .record_pairing(&ctx.session_id, phone, display_name, credentials)
        .await
    {
        warn!(session_id = %ctx.session_id, error = %e, "failed to persist pairing");
    }
}

/// Persist `disconnected`, then attempt the bounded resume loop.
async fn handle_connection_lost(
    ctx: &SupervisorCtx,
    credentials: &Option<Vec<u8>>,
) -> ResumeOutcome {
    ctx.shared.set_connection(None);
    transition(ctx, SessionStatus::Disconnected).await;

    for attempt in 1..=ctx.config.resume_max_attempts {
        let delay = backoff_delay(attempt, &ctx.config);
        debug!(
            session_id = %ctx.session_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "resume backoff"
        );

        tokio::select! {
            _ = ctx.cancel.cancelled() => return ResumeOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }

        match ctx
            .connector
            .open(&ctx.session_id, credentials.clone())
            .await
        {
            Ok(link) => {
                info!(session_id = %ctx.session_id, attempt, "connection resumed");
                return ResumeOutcome::Resumed(link);
            }
            Err(e) => {
                warn!(session_id = %ctx.session_id, attempt, error = %e, "resume attempt failed");
            }
        }
    }

    info!(
        session_id = %ctx.session_id,
        attempts = ctx.config.resume_max_attempts,
        "resume exhausted, forcing re-pairing"
    );
    ctx.shared.set_qr(None);
    transition(ctx, SessionStatus::NotAuth).await;
    if let Err(e) = ctx.storage.clear_credentials(&ctx.session_id).await {
        warn!(session_id = %ctx.session_id, error = %e, "failed to clear credentials");
    }
    ResumeOutcome::Exhausted
}

/// Mirror a status into the shared slot and persist it. Persist failures are
/// logged, never fatal to the supervisor.
async fn transition(ctx: &SupervisorCtx, status: SessionStatus) {
    ctx.shared.set_status(status);
    if let Err(e) = ctx
        .storage
        .update_session_status(&ctx.session_id, status)
        .await
    {
        warn!(session_id = %ctx.session_id, %status, error = %e, "failed to persist status");
    }
}

/// Close the live connection with a bounded timeout; log and continue on
/// failure so teardown never hangs on a wedged connection.
async fn close_connection(ctx: &SupervisorCtx) {
    let Some(conn) = ctx.shared.take_connection() else {
        return;
    };
    let timeout = Duration::from_secs(ctx.config.close_timeout_secs);
    match tokio::time::timeout(timeout, conn.close()).await {
        Ok(Ok(())) => debug!(session_id = %ctx.session_id, "connection closed"),
        Ok(Err(e)) => warn!(session_id = %ctx.session_id, error = %e, "connection close failed"),
        Err(_) => warn!(
            session_id = %ctx.session_id,
            timeout_secs = ctx.config.close_timeout_secs,
            "connection close timed out"
        ),
    }
}

/// Exponential backoff with a cap and up to 25% jitter.
fn backoff_delay(attempt: u32, config: &ConnectionConfig) -> Duration {
    let base = config
        .resume_backoff_ms
        .saturating_mul(1u64 << (attempt - 1).min(16));
    let capped = base.min(config.resume_backoff_max_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4);
    Duration::from_millis(capped + jitter)
}
