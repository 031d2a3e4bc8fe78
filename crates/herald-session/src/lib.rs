// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session connection manager for the Herald dispatch engine.
//!
//! The [`SessionManager`] owns the registry of live connections: at most one
//! connection object per session id, each driven by a dedicated supervisor
//! task (the single writer for that session's state). It exposes the
//! caller-facing session API: create, connect, QR retrieval, status, send,
//! and teardown.

mod shared;
mod supervisor;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use herald_config::model::ConnectionConfig;
use herald_core::{
    HeraldError, QrArtifact, SendReceipt, Session, SessionStatus, StorageAdapter, WireConnector,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shared::SessionShared;
use crate::supervisor::SupervisorCtx;

/// One live session in the registry.
struct LiveSession {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
    /// Set right after spawn; `None` only in the short window before the
    /// handle is recorded or after the supervisor removed itself.
    task: Option<JoinHandle<()>>,
}

type Registry = Arc<Mutex<HashMap<String, LiveSession>>>;

/// Supervises one live connection per session id and exposes the send
/// capability the dispatch workers use.
pub struct SessionManager {
    storage: Arc<dyn StorageAdapter>,
    connector: Arc<dyn WireConnector>,
    config: ConnectionConfig,
    registry: Registry,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        connector: Arc<dyn WireConnector>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            storage,
            connector,
            config,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Allocate a new session record in `not_auth`. Opens no connection.
    pub async fn create_session(&self, description: &str) -> Result<Session, HeraldError> {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.to_string(),
            status: SessionStatus::NotAuth,
            phone: None,
            display_name: None,
            credential_blob: None,
            last_used_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.storage.create_session(&session).await?;
        info!(session_id = %session.id, "session created");
        Ok(session)
    }

    /// Open a connection for the session if none is live. Idempotent:
    /// a concurrent or repeated `connect` for the same id coalesces into the
    /// in-flight attempt instead of opening a duplicate connection.
    ///
    /// With stored credentials the client resumes the existing pairing;
    /// without, fresh pairing starts and a QR artifact becomes available.
    pub async fn connect(&self, session_id: &str) -> Result<(), HeraldError> {
        if self.registry.lock().unwrap().contains_key(session_id) {
            return Ok(());
        }

        let session = self
            .storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| HeraldError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        let credentials = session.credential_blob;
        // Until the client authenticates, the live status is "resuming" or
        // "fresh" -- never the possibly-stale stored status.
        let initial_status = if credentials.is_some() {
            SessionStatus::Disconnected
        } else {
            SessionStatus::NotAuth
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut registry = self.registry.lock().unwrap();
            // Double-check after the storage read: someone else may have
            // connected in the meantime.
            if registry.contains_key(session_id) {
                return Ok(());
            }

            let shared = Arc::new(SessionShared::new(initial_status));
            let cancel = CancellationToken::new();

            let ctx = SupervisorCtx {
                session_id: session_id.to_string(),
                storage: Arc::clone(&self.storage),
                connector: Arc::clone(&self.connector),
                config: self.config.clone(),
                shared: Arc::clone(&shared),
                cancel: cancel.clone(),
                on_exit: Self::make_exit_hook(&self.registry, session_id),
            };

            registry.insert(
                session_id.to_string(),
                LiveSession {
                    shared,
                    cancel,
                    task: None,
                },
            );

            let task = tokio::spawn(supervisor::run(ctx, credentials, ready_tx));
            if let Some(entry) = registry.get_mut(session_id) {
                entry.task = Some(task);
            }
        }

        // Surface the initial open result synchronously.
        match ready_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.registry.lock().unwrap().remove(session_id);
                Err(e)
            }
            Err(_) => {
                self.registry.lock().unwrap().remove(session_id);
                Err(HeraldError::Internal(format!(
                    "supervisor for session {session_id} exited before reporting"
                )))
            }
        }
    }

    fn make_exit_hook(registry: &Registry, session_id: &str) -> Box<dyn FnOnce() + Send + Sync> {
        let registry = Arc::downgrade(registry);
        let session_id = session_id.to_string();
        Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().unwrap().remove(&session_id);
            }
        })
    }

    /// The most recent pairing artifact while the session is `qr_pairing`;
    /// `None` once paired or when no connection is live.
    pub async fn qr_code(&self, session_id: &str) -> Result<Option<QrArtifact>, HeraldError> {
        let live = {
            let registry = self.registry.lock().unwrap();
            registry.get(session_id).map(|l| l.shared.qr())
        };
        match live {
            Some(qr) => Ok(qr),
            None => {
                // Distinguish "no artifact" from "no such session".
                self.storage
                    .get_session(session_id)
                    .await?
                    .ok_or_else(|| HeraldError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;
                Ok(None)
            }
        }
    }

    /// Current status: the live value when a connection exists, otherwise the
    /// durable record (a stored `paired` without a live connection reads as
    /// `disconnected`).
    pub async fn status(&self, session_id: &str) -> Result<SessionStatus, HeraldError> {
        let live = {
            let registry = self.registry.lock().unwrap();
            registry.get(session_id).map(|l| l.shared.status())
        };
        if let Some(status) = live {
            return Ok(status);
        }

        let session = self
            .storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| HeraldError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        Ok(match session.status {
            SessionStatus::Paired => SessionStatus::Disconnected,
            other => other,
        })
    }

    /// Send one message over the session's live connection.
    ///
    /// Only valid while `paired`; otherwise fails with `SessionNotReady`.
    /// The network round-trip is awaited with no session lock held, so a
    /// slow send on one session never stalls dispatch for other sessions.
    pub async fn send(
        &self,
        session_id: &str,
        recipient: &str,
        content: &str,
    ) -> Result<SendReceipt, HeraldError> {
        let live = {
            let registry = self.registry.lock().unwrap();
            registry
                .get(session_id)
                .map(|l| (l.shared.status(), l.shared.connection()))
        };

        match live {
            Some((SessionStatus::Paired, Some(conn))) => {
                let receipt = conn.send(recipient, content).await?;
                if let Err(e) = self.storage.touch_last_used(session_id).await {
                    warn!(session_id, error = %e, "failed to stamp last_used_at");
                }
                Ok(receipt)
            }
            Some((status, _)) => Err(HeraldError::SessionNotReady {
                session_id: session_id.to_string(),
                status,
            }),
            None => {
                let status = self.status(session_id).await?;
                Err(HeraldError::SessionNotReady {
                    session_id: session_id.to_string(),
                    status,
                })
            }
        }
    }

    /// Session ids currently live and `paired` -- the set the dispatch
    /// workers claim for.
    pub fn paired_sessions(&self) -> Vec<String> {
        let registry = self.registry.lock().unwrap();
        let mut ids: Vec<String> = registry
            .iter()
            .filter(|(_, l)| l.shared.status() == SessionStatus::Paired)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Tear down the live connection (if any) and delete the session record.
    /// Terminal from any state. Disconnect errors are logged, not thrown.
    pub async fn remove_session(&self, session_id: &str) -> Result<(), HeraldError> {
        // Take the entry out and release the lock before awaiting teardown:
        // the supervisor's exit hook takes this same lock.
        let live = { self.registry.lock().unwrap().remove(session_id) };
        if let Some(live) = live {
            self.teardown(session_id, live).await;
        }

        self.storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| HeraldError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        self.storage.delete_session(session_id).await?;
        info!(session_id, "session removed");
        Ok(())
    }

    /// Close every live connection. Used at process shutdown; never throws,
    /// never deadlocks -- each teardown is bounded by the close timeout.
    /// Session records are kept so credentials can resume on next start.
    pub async fn remove_all_connections(&self) {
        let drained: Vec<(String, LiveSession)> = {
            let mut registry = self.registry.lock().unwrap();
            registry.drain().collect()
        };

        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "closing all live connections");

        for (session_id, live) in drained {
            self.teardown(&session_id, live).await;
        }
    }

    /// Reconnect sessions that hold resumable credentials and normalize any
    /// stale transient status left by a previous process.
    pub async fn restore_sessions(&self) -> Result<(), HeraldError> {
        let sessions = self.storage.list_sessions(None).await?;
        for session in sessions {
            if session.credential_blob.is_some() {
                debug!(session_id = %session.id, "resuming persisted session");
                if let Err(e) = self.connect(&session.id).await {
                    warn!(session_id = %session.id, error = %e, "failed to resume session");
                }
            } else if session.status != SessionStatus::NotAuth {
                // A pairing or connection state without credentials cannot be
                // resumed; force a fresh pairing.
                self.storage
                    .update_session_status(&session.id, SessionStatus::NotAuth)
                    .await?;
            }
        }
        Ok(())
    }

    /// Cancel a supervisor and wait for it to finish its bounded teardown.
    async fn teardown(&self, session_id: &str, live: LiveSession) {
        live.cancel.cancel();
        let Some(task) = live.task else {
            return;
        };
        // The supervisor's own close path is bounded by close_timeout_secs;
        // the extra second covers scheduling.
        let deadline = Duration::from_secs(self.config.close_timeout_secs + 1);
        let abort = task.abort_handle();
        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(())) => debug!(session_id, "supervisor joined"),
            Ok(Err(e)) => warn!(session_id, error = %e, "supervisor task failed"),
            Err(_) => {
                abort.abort();
                warn!(session_id, "supervisor join timed out, aborted");
            }
        }
    }
}
