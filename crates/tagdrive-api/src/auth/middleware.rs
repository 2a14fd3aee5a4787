//! Access resolution for every protected request.
//!
//! Owner-only routes need a session cookie. Shareable routes also accept a `shareToken`
//! query parameter; a request that carries one is served in shared mode even when the
//! caller holds a session as well.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tagdrive_core::AppError;

use crate::auth::models::AccessMode;
use crate::constants::{AUTH_COOKIE_NAME, SHARE_TOKEN_PARAM};
use crate::error::HttpAppError;
use crate::state::AppState;

/// Value of the session cookie, if the request carries one.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(token: &str, max_age: Duration) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}",
        AUTH_COOKIE_NAME,
        token,
        max_age.as_secs()
    ))
    .map_err(|e| AppError::Internal(format!("invalid cookie value: {}", e)))
}

pub fn expired_session_cookie() -> HeaderValue {
    HeaderValue::from_static("auth=; HttpOnly; Path=/; Max-Age=0")
}

fn share_token_param(request: &Request) -> Option<String> {
    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(SHARE_TOKEN_PARAM))
        .filter(|token| !token.is_empty())
}

async fn resolve_access(
    state: &AppState,
    session: Option<String>,
    share_token: Option<String>,
    shareable: bool,
) -> Result<AccessMode, AppError> {
    if state.config.web.skip_login {
        return Ok(AccessMode::Owner);
    }

    if shareable {
        if let Some(token) = share_token.as_deref() {
            if !state.share().check_token(token).await {
                return Err(AppError::InvalidShareToken);
            }
            return Ok(AccessMode::Shared(token.to_string()));
        }
    }

    if let Some(token) = session.as_deref() {
        if state.auth().check_token(token).await {
            return Ok(AccessMode::Owner);
        }
    }

    if share_token.is_some() {
        return Err(AppError::Forbidden(
            "shared links give read-only access".to_string(),
        ));
    }
    Err(AppError::Unauthorized("need auth".to_string()))
}

async fn authorize(state: &AppState, mut request: Request, next: Next, shareable: bool) -> Response {
    let session = session_token(request.headers());
    let share_token = share_token_param(&request);

    match resolve_access(state, session, share_token, shareable).await {
        Ok(mode) => {
            tracing::trace!(mode = ?mode, path = %request.uri().path(), "Request authorized");
            request.extensions_mut().insert(mode);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

/// Routes reserved for the owner.
pub async fn owner_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    authorize(&state, request, next, false).await
}

/// Read-only routes that a share token may open.
pub async fn shareable_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    authorize(&state, request, next, true).await
}
