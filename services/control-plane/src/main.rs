//! fleetdeck control plane
//!
//! Serves the fleet view, dependency graph and rebuild controls for the
//! containers of one engine, plus a live channel for logs and rebuild
//! progress.

use std::sync::Arc;

use anyhow::Result;
use fleetdeck_control_plane::{api, config, engine::HttpEngine, state::AppState};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to FLEETDECK_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting fleetdeck control plane");
    info!(
        listen_addr = %config.listen_addr,
        engine_url = %config.engine_url,
        data_dir = %config.data_dir.display(),
        scripts_dir = %config.scripts_dir.display(),
        "Configuration loaded"
    );

    let engine = Arc::new(HttpEngine::new(&config.engine_url, config.engine_timeout)?);
    let state = AppState::new(&config, engine).await;

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Warm the fleet cache in background
    let warm_up_handle = tokio::spawn({
        let reconciler = state.reconciler().clone();
        async move {
            reconciler.warm_up().await;
        }
    });

    // Build and run the server
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    // Spawn the server with graceful shutdown
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    if !warm_up_handle.is_finished() {
        warn!("Fleet warm-up still running at shutdown, abandoning it");
        warm_up_handle.abort();
    }

    info!("fleetdeck shutdown complete");
    Ok(())
}
