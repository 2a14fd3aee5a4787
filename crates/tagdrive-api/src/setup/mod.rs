//! Application setup and initialization
//!
//! Everything `main` does before serving lives here so integration tests can build the same
//! router without binding a socket.

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tagdrive_core::Config;
use tagdrive_infra::{init_telemetry, LogFormat};
use tagdrive_services::Stores;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // A subscriber may already be installed (tests); keep going with it.
    if let Err(e) = init_telemetry(LogFormat::from_env()) {
        eprintln!("Telemetry not initialized: {}", e);
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    tracing::info!(
        debug = config.debug,
        port = config.web.port,
        skip_login = config.web.skip_login,
        storage = %config.storage.backend,
        encrypt = config.storage.encrypt,
        var_folder = %config.storage.var_folder.display(),
        "Configuration loaded and validated successfully"
    );
    if config.web.skip_login {
        tracing::warn!("Authorization is disabled");
    }

    let stores = Stores::open(&config).await?;
    let state = Arc::new(AppState::new(config.clone(), stores));
    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
