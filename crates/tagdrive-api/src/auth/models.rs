use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tagdrive_core::AppError;

use crate::error::HttpAppError;

/// Who is making the request, as resolved by the access middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessMode {
    /// Holder of a valid session cookie, or anyone when login is skipped.
    Owner,
    /// Bearer of a valid share token; read-only and limited to the shared files.
    Shared(String),
}

impl AccessMode {
    pub fn share_token(&self) -> Option<&str> {
        match self {
            AccessMode::Owner => None,
            AccessMode::Shared(token) => Some(token),
        }
    }
}

// Extracted from request parts so it combines with body extractors like Multipart
impl<S> FromRequestParts<S> for AccessMode
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessMode>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("need auth".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_token() {
        assert_eq!(AccessMode::Owner.share_token(), None);
        assert_eq!(
            AccessMode::Shared("abc".to_string()).share_token(),
            Some("abc")
        );
    }
}
