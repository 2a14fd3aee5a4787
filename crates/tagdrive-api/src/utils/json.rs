use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tagdrive_core::AppError;

use crate::error::HttpAppError;

/// JSON body, indented when `pretty` is set.
pub fn json_response<T: Serialize + ?Sized>(
    value: &T,
    pretty: bool,
) -> Result<Response, HttpAppError> {
    let body = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(AppError::from)?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_pretty_output_is_indented() {
        let value = serde_json::json!({ "a": [1, 2] });

        let compact = json_response(&value, false).unwrap();
        let body = to_bytes(compact.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"a":[1,2]}"#);

        let pretty = json_response(&value, true).unwrap();
        assert_eq!(
            pretty.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = to_bytes(pretty.into_body(), usize::MAX).await.unwrap();
        assert!(body.contains(&b'\n'));
    }
}
