//! Route configuration and setup.
//!
//! Domain route groups live in [domains](domains); the health check in [health](health).

mod domains;
mod health;

use crate::auth::middleware::{owner_middleware, shareable_middleware};
use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tagdrive_core::Config;
use tagdrive_infra::{request_id_middleware, security_headers_middleware};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    let shareable = shareable_routes(state.clone()).route_layer(from_fn_with_state(
        state.clone(),
        shareable_middleware,
    ));
    let owner = owner_routes(state.clone())
        .route_layer(from_fn_with_state(state.clone(), owner_middleware));

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::debug!(http_concurrency_limit, "HTTP concurrency limit layer enabled");

    let mut app = public_routes()
        .merge(shareable)
        .merge(owner)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.web.upload_max_size_bytes))
        .layer(DefaultBodyLimit::disable());

    if config.debug {
        tracing::warn!("Debug mode: CORS allows every origin");
        app = app.layer(CorsLayer::very_permissive());
    }

    app.layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state)
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(&format!("{}/login", API_PREFIX), post(handlers::login::login))
}

/// Routes open to the owner and to holders of a share token.
fn shareable_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(domains::shared_file_routes(state.clone()))
        .merge(domains::shared_tag_routes(state.clone()))
        .merge(domains::data_routes(state.clone()))
        .with_state(state)
}

fn owner_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(domains::session_routes(state.clone()))
        .merge(domains::owner_file_routes(state.clone()))
        .merge(domains::owner_tag_routes(state.clone()))
        .merge(domains::share_routes(state.clone()))
        .with_state(state)
}
