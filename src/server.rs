// ABOUTME: HTTP server bootstrap, background session sweeping, and graceful shutdown
// ABOUTME: Binds the assembled router and runs it until a shutdown signal arrives
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Server runtime: bind, serve, sweep, shut down

use crate::constants::defaults;
use crate::database::Database;
use crate::resources::ServerResources;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Run the HTTP server until a shutdown signal arrives.
///
/// Spawns the periodic expired-session sweep alongside the listener; the
/// sweep task is aborted when the server stops.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn run(resources: Arc<ServerResources>) -> Result<()> {
    let port = resources.config.http_port;
    let app = crate::routes::router(resources.clone());

    let sweeper = spawn_session_sweeper(resources.database.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("LTI bridge listening on port {port}");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    result.map_err(Into::into)
}

/// Periodically delete expired launch sessions. Sessions also expire at
/// lookup time; the sweep only reclaims rows for launches that never
/// came back.
fn spawn_session_sweeper(database: Arc<Database>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(defaults::SESSION_SWEEP_INTERVAL_SECS));
        // The first tick fires immediately; skip it so startup isn't
        // serialized behind a sweep.
        interval.tick().await;

        loop {
            interval.tick().await;
            match database.sweep_expired_sessions().await {
                Ok(0) => {}
                Ok(count) => info!("swept {count} expired launch sessions"),
                Err(e) => warn!("session sweep failed: {e}"),
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install shutdown signal handler: {e}");
        return;
    }
    info!("shutdown signal received");
}
