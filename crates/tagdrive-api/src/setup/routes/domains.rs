//! Domain route groups (files, tags, share tokens, raw data, session).
//!
//! Each group comes in two halves: routes a share token may reach, and routes only the owner
//! may reach. The caller puts the matching access middleware on each half.

use crate::constants::{API_PREFIX, DATA_PREFIX};
use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn shared_file_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/files", API_PREFIX), get(handlers::files::list_files))
        .route(
            &format!("{}/files/download", API_PREFIX),
            get(handlers::files::download_files),
        )
        .route(&format!("{}/file/{{id}}", API_PREFIX), get(handlers::files::get_file))
        .with_state(state)
}

pub fn owner_file_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/files", API_PREFIX),
            post(handlers::files::upload_files).delete(handlers::files::delete_files),
        )
        .route(
            &format!("{}/files/recent", API_PREFIX),
            get(handlers::files::recent_files),
        )
        .route(
            &format!("{}/files/recover", API_PREFIX),
            post(handlers::files::recover_files),
        )
        .route(
            &format!("{}/files/tags", API_PREFIX),
            post(handlers::files::add_tags_to_files).delete(handlers::files::remove_tags_from_files),
        )
        .route(
            &format!("{}/file/{{id}}/name", API_PREFIX),
            put(handlers::files::rename_file),
        )
        .route(
            &format!("{}/file/{{id}}/tags", API_PREFIX),
            put(handlers::files::change_file_tags),
        )
        .route(
            &format!("{}/file/{{id}}/description", API_PREFIX),
            put(handlers::files::change_file_description),
        )
        .with_state(state)
}

pub fn shared_tag_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/tags", API_PREFIX), get(handlers::tags::list_tags))
        .with_state(state)
}

pub fn owner_tag_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/tags", API_PREFIX),
            post(handlers::tags::add_tag).delete(handlers::tags::delete_tag),
        )
        .route(&format!("{}/tag/{{id}}", API_PREFIX), put(handlers::tags::change_tag))
        .with_state(state)
}

pub fn share_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/share/tokens", API_PREFIX),
            get(handlers::share::list_tokens),
        )
        .route(
            &format!("{}/share/token", API_PREFIX),
            post(handlers::share::create_token),
        )
        .route(
            &format!("{}/share/token/{{token}}", API_PREFIX),
            get(handlers::share::token_files).delete(handlers::share::delete_token),
        )
        .with_state(state)
}

pub fn data_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/{{id}}", DATA_PREFIX), get(handlers::data::original))
        .route(
            &format!("{}/resized/{{id}}", DATA_PREFIX),
            get(handlers::data::resized),
        )
        .with_state(state)
}

pub fn session_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/user", API_PREFIX), get(handlers::login::user))
        .route(&format!("{}/logout", API_PREFIX), post(handlers::login::logout))
        .with_state(state)
}
