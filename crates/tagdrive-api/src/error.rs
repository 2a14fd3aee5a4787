//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Component errors convert into
//! `AppError` first, so status, body and logging stay the same everywhere.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tagdrive_core::{AppError, ErrorMetadata, LogLevel};
use tagdrive_services::{FileServiceError, MetadataError, ShareError, TagError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rule: both `IntoResponse` and `AppError` are foreign here).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<FileServiceError> for HttpAppError {
    fn from(err: FileServiceError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<MetadataError> for HttpAppError {
    fn from(err: MetadataError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<TagError> for HttpAppError {
    fn from(err: TagError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<ShareError> for HttpAppError {
    fn from(err: ShareError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        let app = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        };
        HttpAppError(app)
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error.detailed_message(),
                error_type = error_type,
                "Error occurred"
            );
        }
    }
}

impl HttpAppError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn body(&self) -> ErrorResponse {
        let app_error = &self.0;
        let (details, error_type) = if app_error.is_sensitive() {
            (None, None)
        } else {
            (
                Some(app_error.detailed_message()),
                Some(app_error.error_type().to_string()),
            )
        };

        ErrorResponse {
            error: app_error.client_message(),
            details,
            error_type,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        log_error(&self.0);
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagdrive_storage::StorageError;

    #[test]
    fn test_bad_expression_is_bad_request() {
        let err = HttpAppError::from(FileServiceError::BadExpressionSyntax(
            tagdrive_core::parse_expression("1&").unwrap_err(),
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().code, "BAD_EXPRESSION_SYNTAX");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = HttpAppError::from(MetadataError::NotExist(42));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.body().error.contains("42"));
    }

    #[test]
    fn test_storage_failure_hides_details() {
        let err = HttpAppError::from(FileServiceError::Storage(StorageError::BackendError(
            "bucket is gone".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = err.body();
        assert!(body.details.is_none());
        assert!(!body.error.contains("bucket"));
        assert!(body.recoverable);
    }

    #[test]
    fn test_invalid_share_token() {
        let err = HttpAppError::from(ShareError::InvalidToken);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().error, "invalid share token");
    }

    /// Verifies the public error response contract: serialized ErrorResponse has "error",
    /// "code", "recoverable", and optionally "details" / "error_type" / "suggested_action".
    #[test]
    fn test_error_response_shape() {
        let response = HttpAppError(AppError::RateLimited).body();
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(
            json.get("error").and_then(|v| v.as_str()),
            Some("too many auth requests")
        );
        assert_eq!(json.get("code").and_then(|v| v.as_str()), Some("RATE_LIMITED"));
        assert_eq!(json.get("recoverable").and_then(|v| v.as_bool()), Some(true));
        assert!(json.get("suggested_action").is_some());
    }
}
