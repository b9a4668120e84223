//! Request extractors whose rejections render as [`AppError`].
//!
//! Axum's own `Json`, `Query` and `Path` reject with plain-text bodies. These
//! wrappers turn every rejection into a `400` with the usual JSON error body.

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// JSON body that may be left out entirely; an empty body gives `T::default()`.
#[derive(Debug)]
pub struct OptionalJson<T>(pub T);

impl<S, T> FromRequest<S> for OptionalJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        serde_json::from_slice(&body).map(Self).map_err(|e| {
            AppError::BadRequest(format!("Failed to parse the request body as JSON: {e}"))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq, Eq)]
    struct Note {
        text: Option<String>,
    }

    async fn extract(body: &'static str) -> Result<OptionalJson<Note>, AppError> {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(body))
            .unwrap();
        OptionalJson::<Note>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_optional_json() {
        assert_eq!(extract("").await.unwrap().0, Note::default());
        assert_eq!(extract("  \n").await.unwrap().0, Note::default());
        assert_eq!(
            extract(r#"{"text":"hi"}"#).await.unwrap().0,
            Note {
                text: Some("hi".to_owned())
            }
        );
        assert!(matches!(
            extract("{nope").await,
            Err(AppError::BadRequest(_))
        ));
    }
}
