use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use tagdrive_core::secrets::generate_token;

const REQUEST_ID_HEADER: &str = "X-Request-ID";
const REQUEST_ID_LEN: usize = 16;
const MAX_INCOMING_LEN: usize = 128;

/// Request ID extension type
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Tags every request with an id, reusing a sane incoming `X-Request-ID`,
/// and echoes it in the response headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= MAX_INCOMING_LEN)
        .map(|s| s.to_string())
        .unwrap_or_else(|| generate_token(REQUEST_ID_LEN));

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Extract request ID from request extensions
pub fn get_request_id(request: &Request) -> Option<String> {
    request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
}
