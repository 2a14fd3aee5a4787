//! `/api/files` and `/api/file/{id}` endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tagdrive_core::models::{SortMode, SortOrder};
use tagdrive_core::AppError;
use tagdrive_services::FileQuery;

use crate::auth::AccessMode;
use crate::constants::DEFAULT_RECENT_NUMBER;
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::json::json_response;
use crate::utils::params::{parse_id, parse_ids, Params};

/// One entry of the per-file status list returned by upload and delete.
#[derive(Debug, Serialize)]
pub struct FileStatus {
    pub filename: String,
    #[serde(rename = "isError")]
    pub is_error: bool,
    pub error: String,
    pub status: String,
}

impl FileStatus {
    fn done(filename: impl Into<String>, status: &str) -> Self {
        Self {
            filename: filename.into(),
            is_error: false,
            error: String::new(),
            status: status.to_string(),
        }
    }

    fn failed(filename: impl Into<String>, error: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            is_error: true,
            error: error.to_string(),
            status: String::new(),
        }
    }
}

fn file_query(params: &Params) -> FileQuery {
    let sort = match params.get("sort") {
        "size" => SortMode::Size,
        "time" => SortMode::Time,
        _ => SortMode::Name,
    };
    let order = match params.get("order") {
        "desc" => SortOrder::Desc,
        _ => SortOrder::Asc,
    };

    FileQuery {
        expr: params.get("expr").to_string(),
        search: params.get("search").to_string(),
        is_regexp: params.flag("isRegexp"),
        sort,
        order,
        offset: params.parse_or("offset", 0),
        count: params.parse_or("count", 0),
    }
}

/// GET /api/files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    access: AccessMode,
    params: Params,
) -> Result<Response, HttpAppError> {
    let query = file_query(&params);
    let files = state.files().get(&query, access.share_token()).await?;
    json_response(&files, state.pretty_json())
}

/// GET /api/files/recent
pub async fn recent_files(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Response, HttpAppError> {
    let number = params.parse_or("number", DEFAULT_RECENT_NUMBER);
    let files = state.files().get_recent(number).await?;
    json_response(&files, state.pretty_json())
}

/// GET /api/file/{id}
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    access: AccessMode,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    let id = parse_id(&id)?;
    ensure_shared(&state, &access, id).await?;

    let file = state.files().get_file(id).await?;
    json_response(&file, state.pretty_json())
}

/// Shared callers only see files covered by their token.
pub(crate) async fn ensure_shared(
    state: &AppState,
    access: &AccessMode,
    id: u64,
) -> Result<(), HttpAppError> {
    if let Some(token) = access.share_token() {
        if !state.share().check_file(token, id).await {
            return Err(HttpAppError(AppError::NotFound(format!(
                "file with id \"{}\" doesn't exist",
                id
            ))));
        }
    }
    Ok(())
}

/// GET /api/files/download
#[tracing::instrument(skip(state, access, params))]
pub async fn download_files(
    State(state): State<Arc<AppState>>,
    access: AccessMode,
    params: Params,
) -> Result<Response, HttpAppError> {
    let mut ids = params.ids("ids");
    if let Some(token) = access.share_token() {
        let shared = state.share().get_file_ids(token).await?;
        ids.retain(|id| shared.binary_search(id).is_ok());
    }

    let archive = state.files().archive(&ids).await?;
    tracing::debug!(files = ids.len(), size_bytes = archive.len(), "Archive sent");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=\"files.zip\""),
            ),
        ],
        archive,
    )
        .into_response())
}

/// POST /api/files
///
/// Multipart with one `files` part per file. Tags come from the `tags` query parameter or
/// a `tags` part; a part applies to the files that follow it.
#[tracing::instrument(skip_all)]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let mut tags = query
        .get("tags")
        .map(String::as_str)
        .map(parse_ids)
        .unwrap_or_default();
    let mut statuses = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("tags") => {
                tags = parse_ids(&field.text().await?);
            }
            Some("files") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match state.files().upload(&filename, &tags, Box::pin(field)).await {
                    Ok(_) => statuses.push(FileStatus::done(filename, "uploaded")),
                    Err(e) => {
                        tracing::error!(error = %e, filename = %filename, "Can't upload file");
                        statuses.push(FileStatus::failed(filename, e));
                    }
                }
            }
            _ => {}
        }
    }

    json_response(&statuses, state.pretty_json())
}

/// DELETE /api/files
#[tracing::instrument(skip_all)]
pub async fn delete_files(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Response, HttpAppError> {
    let force = params.flag("force");
    let mut statuses = Vec::new();

    for id in params.ids("ids") {
        let file = match state.files().get_file(id).await {
            Ok(file) => file,
            Err(e) => {
                statuses.push(FileStatus::failed("", e));
                continue;
            }
        };

        let result = if force {
            state.files().delete_force(id).await.map(|_| "deleted")
        } else {
            state.files().delete(id).await.map(|_| "added into trash")
        };
        statuses.push(match result {
            Ok(status) => FileStatus::done(file.filename, status),
            Err(e) => FileStatus::failed(file.filename, e),
        });
    }

    json_response(&statuses, state.pretty_json())
}

/// POST /api/files/recover
pub async fn recover_files(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<StatusCode, HttpAppError> {
    let ids = params.ids("ids");
    if ids.is_empty() {
        return Err(HttpAppError(AppError::BadRequest(
            "list of ids of files for recovering can't be empty".to_string(),
        )));
    }

    for id in ids {
        if state.files().recover(id).await {
            tracing::info!(file_id = id, "File recovered");
        }
    }
    Ok(StatusCode::OK)
}

/// PUT /api/file/{id}/name
pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: Params,
) -> Result<StatusCode, HttpAppError> {
    let id = parse_id(&id)?;
    state.files().rename(id, params.get("new-name")).await?;
    Ok(StatusCode::OK)
}

/// PUT /api/file/{id}/tags
pub async fn change_file_tags(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: Params,
) -> Result<StatusCode, HttpAppError> {
    let id = parse_id(&id)?;
    state.files().change_tags(id, &params.ids("tags")).await?;
    Ok(StatusCode::OK)
}

/// PUT /api/file/{id}/description
pub async fn change_file_description(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: Params,
) -> Result<StatusCode, HttpAppError> {
    let id = parse_id(&id)?;
    state
        .files()
        .change_description(id, params.get("description"))
        .await?;
    Ok(StatusCode::OK)
}

/// POST /api/files/tags
pub async fn add_tags_to_files(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> StatusCode {
    state
        .files()
        .add_tags_to_files(&params.ids("files"), &params.ids("tags"))
        .await;
    StatusCode::OK
}

/// DELETE /api/files/tags
pub async fn remove_tags_from_files(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> StatusCode {
    state
        .files()
        .remove_tags_from_files(&params.ids("files"), &params.ids("tags"))
        .await;
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
            .into()
    }

    #[test]
    fn test_file_query_defaults() {
        let query = file_query(&params(&[("sort", "weird"), ("offset", "-1"), ("count", "x")]));
        assert_eq!(query.sort, SortMode::Name);
        assert_eq!(query.order, SortOrder::Asc);
        assert_eq!(query.offset, 0);
        assert_eq!(query.count, 0);
        assert!(!query.is_regexp);
    }

    #[test]
    fn test_file_query_reads_every_field() {
        let query = file_query(&params(&[
            ("expr", "1&!2"),
            ("search", "photo"),
            ("isRegexp", "true"),
            ("sort", "size"),
            ("order", "desc"),
            ("offset", "2"),
            ("count", "3"),
        ]));
        assert_eq!(query.expr, "1&!2");
        assert_eq!(query.search, "photo");
        assert!(query.is_regexp);
        assert_eq!(query.sort, SortMode::Size);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!((query.offset, query.count), (2, 3));
    }

    #[test]
    fn test_status_shape() {
        let json = serde_json::to_value(FileStatus::done("a.txt", "uploaded")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"filename": "a.txt", "isError": false, "error": "", "status": "uploaded"})
        );
    }
}
