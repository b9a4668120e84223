//! Request ID middleware for request tracing and correlation.
//!
//! Uses the `x-request-id` header from an upstream proxy when it looks sane,
//! otherwise generates a UUID v4. The ID is recorded on the request span,
//! tagged on the Sentry scope, stored in the request extensions and echoed
//! in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID that is accepted as is.
const MAX_REQUEST_ID_LENGTH: usize = 128;

/// The request ID, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(upstream_id)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", request_id.as_str());

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

fn upstream_id(value: &str) -> Option<&str> {
    let value = value.trim();
    let sane = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LENGTH
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    sane.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id() {
        assert_eq!(upstream_id("abc-123_x.y"), Some("abc-123_x.y"));
        assert_eq!(upstream_id(" abc "), Some("abc"));
        assert_eq!(upstream_id(""), None);
        assert_eq!(upstream_id("has space"), None);
        assert_eq!(upstream_id(&"a".repeat(129)), None);
    }
}
