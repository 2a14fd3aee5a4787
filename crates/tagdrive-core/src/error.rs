//! Error types module
//!
//! All failures that can reach a client are unified under [`AppError`]. Component crates keep
//! their own small `thiserror` enums and convert into `AppError` at the service boundary, so the
//! HTTP layer only has to understand one type.

use std::io;

use crate::expression::ExpressionError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limiting
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "BAD_EXPRESSION_SYNTAX")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("bad syntax of logical expression")]
    BadExpressionSyntax,

    #[error("offset is out of bounds")]
    OffsetOutOfBounds,

    #[error("file with id {0} is already in trash")]
    DeletedAgain(u64),

    #[error("new name can't be empty")]
    EmptyNewName,

    #[error("invalid share token")]
    InvalidShareToken,

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("too many auth requests")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<ExpressionError> for AppError {
    fn from(_: ExpressionError) -> Self {
        AppError::BadExpressionSyntax
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Encryption(_) => (
            500,
            "ENCRYPTION_ERROR",
            false,
            Some("Check the storage pass phrase"),
            true,
            LogLevel::Error,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadExpressionSyntax => (
            400,
            "BAD_EXPRESSION_SYNTAX",
            false,
            Some("Use tag ids joined by !, &, | and parentheses"),
            false,
            LogLevel::Debug,
        ),
        AppError::OffsetOutOfBounds => (
            400,
            "OFFSET_OUT_OF_BOUNDS",
            false,
            Some("Request a smaller offset"),
            false,
            LogLevel::Debug,
        ),
        AppError::DeletedAgain(_) => (
            400,
            "DELETED_AGAIN",
            false,
            Some("Recover the file or delete it with force"),
            false,
            LogLevel::Debug,
        ),
        AppError::EmptyNewName => (
            400,
            "EMPTY_NEW_NAME",
            false,
            Some("Provide a non-empty file name"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidShareToken => (
            400,
            "INVALID_SHARE_TOKEN",
            false,
            Some("Ask the owner for a new share link"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidCredentials(_) => (
            400,
            "INVALID_CREDENTIALS",
            false,
            Some("Check login and password"),
            false,
            LogLevel::Warn,
        ),
        AppError::RateLimited => (
            429,
            "RATE_LIMITED",
            true,
            Some("Wait before the next login attempt"),
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Log in and retry"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Shared links are read-only"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Storage(_) => "Storage",
            AppError::Encryption(_) => "Encryption",
            AppError::BadRequest(_) => "BadRequest",
            AppError::BadExpressionSyntax => "BadExpressionSyntax",
            AppError::OffsetOutOfBounds => "OffsetOutOfBounds",
            AppError::DeletedAgain(_) => "DeletedAgain",
            AppError::EmptyNewName => "EmptyNewName",
            AppError::InvalidShareToken => "InvalidShareToken",
            AppError::InvalidCredentials(_) => "InvalidCredentials",
            AppError::RateLimited => "RateLimited",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Encryption(_) => "Failed to decrypt stored data".to_string(),
            AppError::BadRequest(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::InvalidCredentials(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_storage() {
        let err = AppError::Storage("disk full".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access storage");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("file with id 3 doesn't exist".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "file with id 3 doesn't exist");
        assert!(!err.is_sensitive());
    }

    #[test]
    fn test_state_conflicts_are_bad_requests() {
        assert_eq!(AppError::DeletedAgain(5).http_status_code(), 400);
        assert_eq!(AppError::OffsetOutOfBounds.http_status_code(), 400);
        assert_eq!(AppError::EmptyNewName.http_status_code(), 400);
        assert_eq!(AppError::InvalidShareToken.http_status_code(), 400);
        assert_eq!(
            AppError::InvalidShareToken.client_message(),
            "invalid share token"
        );
    }

    #[test]
    fn test_rate_limited_metadata() {
        let err = AppError::RateLimited;
        assert_eq!(err.http_status_code(), 429);
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_expression_error_conversion() {
        let err: AppError = ExpressionError::UnbalancedParentheses.into();
        assert!(matches!(err, AppError::BadExpressionSyntax));
        assert_eq!(err.error_code(), "BAD_EXPRESSION_SYNTAX");
    }

    #[test]
    fn test_detailed_message_includes_source() {
        let err: AppError = anyhow::anyhow!("root cause").context("outer").into();
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("root cause") || details.contains("outer"));
    }
}
