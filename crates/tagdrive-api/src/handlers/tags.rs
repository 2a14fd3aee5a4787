use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use tagdrive_core::AppError;

use crate::auth::AccessMode;
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::json::json_response;
use crate::utils::params::{parse_id, Params};

/// GET /api/tags
///
/// Shared callers get only the tags carried by their files.
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    access: AccessMode,
) -> Result<Response, HttpAppError> {
    let tags = state.files().visible_tags(access.share_token()).await?;
    json_response(&tags, state.pretty_json())
}

/// POST /api/tags
pub async fn add_tag(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Response, HttpAppError> {
    let tag = state
        .tags()
        .add(params.get("name"), params.get("color"), params.get("group"))
        .await?;
    tracing::info!(tag_id = tag.id, name = %tag.name, "Tag created");
    json_response(&tag, state.pretty_json())
}

/// PUT /api/tag/{id}
///
/// Empty name or color keep the current value; a `group` parameter, even an empty one,
/// replaces the group.
pub async fn change_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: Params,
) -> Result<Response, HttpAppError> {
    let id = parse_id(&id)?;
    let (name, color) = (params.get("name"), params.get("color"));

    let mut tag = state.tags().get(id).await?;
    if !name.is_empty() || !color.is_empty() {
        tag = state.tags().update_tag(id, name, color).await?;
    }
    if let Some(group) = params.get_opt("group") {
        tag = state.tags().update_group(id, group).await?;
    }

    json_response(&tag, state.pretty_json())
}

/// DELETE /api/tags
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<StatusCode, HttpAppError> {
    let id = params
        .get("id")
        .parse::<u64>()
        .map_err(|_| HttpAppError(AppError::BadRequest("tag id isn't valid".to_string())))?;

    state.files().delete_tag(id).await;
    Ok(StatusCode::OK)
}
