//! Form-style request parameters.
//!
//! Clients send parameters in the query string or as an urlencoded body; both are merged
//! and body values win. Missing values read as empty strings and lenient parsers fall back
//! to defaults instead of rejecting the request.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Form, FromRequest, Query, Request};
use axum::http::header::CONTENT_TYPE;
use tagdrive_core::AppError;

use crate::error::HttpAppError;

#[derive(Debug, Default, Clone)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }

    /// `None` when the parameter is absent; present but empty is `Some("")`.
    pub fn get_opt(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parsed value, or `default` when missing or malformed.
    pub fn parse_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.get(name).trim().parse().unwrap_or(default)
    }

    /// Any non-empty value means true.
    pub fn flag(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// Comma-separated id list; unparsable items are skipped.
    pub fn ids(&self, name: &str) -> Vec<u64> {
        parse_ids(self.get(name))
    }
}

impl From<HashMap<String, String>> for Params {
    fn from(map: HashMap<String, String>) -> Self {
        Params(map)
    }
}

pub fn parse_ids(csv: &str) -> Vec<u64> {
    csv.split(',')
        .filter_map(|item| item.trim().parse().ok())
        .collect()
}

/// Id from a path segment.
pub fn parse_id(raw: &str) -> Result<u64, HttpAppError> {
    raw.parse()
        .map_err(|_| HttpAppError(AppError::BadRequest("bad id syntax".to_string())))
}

fn is_urlencoded(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

impl<S> FromRequest<S> for Params
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map_err(|e| HttpAppError(AppError::BadRequest(e.body_text())))?;

        if is_urlencoded(&req) {
            let Form(body) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| HttpAppError(AppError::BadRequest(e.body_text())))?;
            params.extend(body);
        }

        Ok(Params(params))
    }
}
