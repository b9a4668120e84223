//! Bearer token authentication.
//!
//! Provides the [`RequireUser`] extractor for route handlers.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Extractor that requires a valid, unrevoked bearer token of a live user.
///
/// Rejects with `401` otherwise.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(user): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_owned()))?;

        let claims = state.tokens().verify(token)?;
        if state.revocations().is_revoked(&claims.jti).await {
            return Err(AuthError::TokenRevoked.into());
        }

        // Tokens of deleted accounts stop working immediately.
        let mut uow = state.store().begin().await?;
        let user = uow
            .find_user(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        uow.commit().await?;

        Span::current().record("user_id", tracing::field::display(user.id));
        set_sentry_user(&user.id, Some(user.email.as_str()));

        Ok(Self(CurrentUser {
            id: user.id,
            email: user.email,
            token_expires_at: claims.expires_at(),
            token_id: claims.jti,
        }))
    }
}

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
