// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald serve` command implementation.
//!
//! Composition root for the dispatch service: storage, session manager,
//! worker pool, and the shutdown sequence. On termination signals the
//! teardown order is: drain the worker pool, close every live connection,
//! checkpoint and close storage -- each step bounded so shutdown never
//! deadlocks on a wedged connection.

use std::sync::Arc;

use herald_config::model::HeraldConfig;
use herald_core::{HeraldError, StorageAdapter, WireConnector};
use herald_dispatch::WorkerPool;
use herald_loopback::LoopbackConnector;
use herald_session::SessionManager;
use herald_storage::SqliteStorage;
use tracing::{info, warn};

use crate::signal;

/// Runs the `herald serve` command.
pub async fn run_serve(config: HeraldConfig, loopback: bool) -> Result<(), HeraldError> {
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "starting herald serve");

    if !loopback {
        warn!("no external wire connector is linked; using the loopback connector");
    }
    let connector: Arc<dyn WireConnector> = Arc::new(LoopbackConnector::new());

    // Storage first: everything else communicates through it.
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    // Recover items claimed by a previous process before any worker starts.
    match storage.requeue_expired().await? {
        0 => {}
        n => info!(requeued = n, "recovered stale claims from previous run"),
    }

    let manager = Arc::new(SessionManager::new(
        Arc::clone(&storage),
        connector,
        config.connection.clone(),
    ));

    // Resume sessions that hold credentials from a previous run.
    manager.restore_sessions().await?;

    let runner = WorkerPool::spawn(
        Arc::clone(&storage),
        Arc::clone(&manager),
        config.dispatch.clone(),
    );

    let cancel = signal::install_signal_handler();
    info!("herald running; press Ctrl+C to stop");
    cancel.cancelled().await;

    // Teardown order matters: stop claiming before closing connections,
    // close connections before the final storage checkpoint.
    runner.shutdown().await;
    manager.remove_all_connections().await;
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("herald stopped");
    Ok(())
}

/// Initialize the tracing subscriber with the configured level.
///
/// `RUST_LOG` overrides the config value when set.
fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
