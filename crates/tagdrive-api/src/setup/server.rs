//! Server startup and graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tagdrive_core::Config;
use tokio::sync::Notify;

use crate::constants::SHUTDOWN_TIMEOUT_SECS;

/// Serves `app` until Ctrl+C or SIGTERM, then drains in-flight requests.
///
/// Requests still running after the shutdown timeout are dropped.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.web.port);
    tracing::info!(addr = %addr, tls = config.web.tls, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_upload_mb = config.web.upload_max_size_bytes / 1024 / 1024,
        storage = %config.storage.backend,
        encrypt = config.storage.encrypt,
        "Server ready and accepting connections"
    );

    let stop = Arc::new(Notify::new());
    let server = {
        let stop = stop.clone();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { stop.notified().await })
            .await
        })
    };

    shutdown_signal().await;
    stop.notify_one();

    let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    let abort = server.abort_handle();
    match tokio::time::timeout(timeout, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Web server stopped"),
        Ok(Ok(Err(e))) => return Err(e.into()),
        Ok(Err(e)) => tracing::error!(error = %e, "Web server task failed"),
        Err(_) => {
            tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT_SECS,
                "Web server didn't stop in time, dropping open connections"
            );
            abort.abort();
        }
    }

    Ok(())
}

/// Signal handler for graceful shutdown
///
/// Listens for Ctrl+C (SIGINT) and SIGTERM signals to initiate graceful shutdown.
///
/// # Panics
/// - Panics if Ctrl+C signal handler cannot be installed (unrecoverable system error)
/// - On Unix systems, panics if SIGTERM signal handler cannot be installed (unrecoverable system error)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
