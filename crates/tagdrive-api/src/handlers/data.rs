//! Raw object bytes: `/data/{id}` and `/data/resized/{id}`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tagdrive_services::ObjectVariant;

use crate::auth::AccessMode;
use crate::constants::DATA_CACHE_MAX_AGE_SECS;
use crate::error::HttpAppError;
use crate::handlers::files::ensure_shared;
use crate::state::AppState;
use crate::utils::params::parse_id;

async fn serve_object(
    state: &AppState,
    access: &AccessMode,
    raw_id: &str,
    variant: ObjectVariant,
) -> Result<Response, HttpAppError> {
    let id = parse_id(raw_id)?;
    ensure_shared(state, access, id).await?;

    let file = state.files().get_file(id).await?;
    let stream = state.files().open_object(id, variant).await?;

    let cache_control = HeaderValue::from_str(&format!(
        "private, max-age={}",
        DATA_CACHE_MAX_AGE_SECS
    ))
    .unwrap_or(HeaderValue::from_static("private"));

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(file.file_type.content_type()),
            ),
            (header::CACHE_CONTROL, cache_control),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /data/{id}
pub async fn original(
    State(state): State<Arc<AppState>>,
    access: AccessMode,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    serve_object(&state, &access, &id, ObjectVariant::Original).await
}

/// GET /data/resized/{id}
pub async fn resized(
    State(state): State<Arc<AppState>>,
    access: AccessMode,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    serve_object(&state, &access, &id, ObjectVariant::Resized).await
}
