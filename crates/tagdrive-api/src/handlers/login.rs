//! Session endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tagdrive_core::AppError;

use crate::auth::middleware::{expired_session_cookie, session_cookie, session_token};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ip_extraction::ClientIp;
use crate::utils::json::json_response;
use crate::utils::params::Params;

#[derive(Debug, Serialize)]
pub struct UserStatus {
    pub authorized: bool,
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// POST /api/login
///
/// `password` arrives already hashed by the client. Every attempt, successful or not,
/// takes a token from the caller's rate-limit bucket.
#[tracing::instrument(skip(state, params), fields(client_ip = %client_ip.0))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    params: Params,
) -> Result<Response, HttpAppError> {
    if !state.login_limiter.take(&client_ip.0).await {
        return Err(HttpAppError(AppError::RateLimited));
    }

    let web = &state.config.web;
    let login = params.get("login");
    let login_ok = secure_compare(login, &web.login);
    let password_ok = secure_compare(params.get("password"), web.password_hash.expose());

    if !login_ok || !password_ok {
        tracing::warn!(login = %login, "Failed login attempt");
        let message = if login_ok {
            "invalid password"
        } else {
            "invalid login"
        };
        return Err(HttpAppError(AppError::InvalidCredentials(message.to_string())));
    }

    let token = state.auth().generate_token();
    state.auth().add_token(&token).await;
    tracing::info!("Successful login");

    let cookie = session_cookie(&token, state.auth().max_token_life())?;
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]).into_response())
}

/// POST /api/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.auth().delete_token(&token).await;
        tracing::info!("Logged out");
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, expired_session_cookie())],
    )
        .into_response()
}

/// GET /api/user
///
/// Reaching the handler means the access middleware accepted the session.
pub async fn user(State(state): State<Arc<AppState>>) -> Result<Response, HttpAppError> {
    json_response(&UserStatus { authorized: true }, state.pretty_json())
}
