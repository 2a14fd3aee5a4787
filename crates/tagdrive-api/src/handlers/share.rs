use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::json::json_response;
use crate::utils::params::Params;

#[derive(Debug, Serialize)]
pub struct CreatedToken {
    pub token: String,
}

/// GET /api/share/tokens
pub async fn list_tokens(State(state): State<Arc<AppState>>) -> Result<Response, HttpAppError> {
    let tokens = state.share().get_all_tokens().await;
    json_response(&tokens, state.pretty_json())
}

/// GET /api/share/token/{token}
pub async fn token_files(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Response, HttpAppError> {
    let ids = state.share().get_file_ids(&token).await?;
    json_response(&ids, state.pretty_json())
}

/// POST /api/share/token
///
/// Ids of files that don't exist are left out of the token.
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Response, HttpAppError> {
    let mut ids = Vec::new();
    for id in params.ids("ids") {
        if state.files().check_file(id).await {
            ids.push(id);
        }
    }

    let token = state.share().create_token(&ids).await;
    json_response(&CreatedToken { token }, state.pretty_json())
}

/// DELETE /api/share/token/{token}
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> StatusCode {
    state.share().delete_token(&token).await;
    StatusCode::OK
}
