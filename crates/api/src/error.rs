//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error renders as `{"error": <code>, "message": <text>}`. Server errors
//! carry a generic message; the details only go to the log and Sentry.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use larder_core::{EmailError, MetadataError, PaginationError, QuantityError};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Malformed input or a broken business rule.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Purchase of a list without items.
    #[error("list has no items")]
    ListEmpty,

    /// Purchase of a list whose items are all unmarked.
    #[error("list has no purchased items")]
    NothingPurchased,

    /// Resource missing or not accessible to the caller.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate name, product or email.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller can see the resource but may not change it.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl AppError {
    /// Create a `NotFound` error for a named resource.
    #[must_use]
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{resource} not found"))
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ListEmpty | Self::NothingPurchased => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) | Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::Database(RepositoryError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::EmailNotVerified
                | AuthError::InvalidToken
                | AuthError::TokenRevoked => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists | AuthError::AlreadyVerified => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidCode => StatusCode::BAD_REQUEST,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                AuthError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ListEmpty => "list_empty",
            Self::NothingPurchased => "nothing_purchased",
            _ => match self.status() {
                StatusCode::BAD_REQUEST => "bad_request",
                StatusCode::NOT_FOUND => "not_found",
                StatusCode::CONFLICT => "conflict",
                StatusCode::FORBIDDEN => "forbidden",
                StatusCode::UNAUTHORIZED => "unauthorized",
                _ => "server_error",
            },
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_owned(),
                AuthError::EmailNotVerified => "Email address has not been verified".to_owned(),
                AuthError::InvalidToken => "Invalid or expired token".to_owned(),
                AuthError::TokenRevoked => "Token has been revoked".to_owned(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::AlreadyVerified => "Email address is already verified".to_owned(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(e) => format!("Invalid email address: {e}"),
                AuthError::InvalidCode => "Invalid or expired code".to_owned(),
                AuthError::UserNotFound => "user not found".to_owned(),
                AuthError::Repository(RepositoryError::Conflict(msg)) => msg.clone(),
                AuthError::Repository(RepositoryError::NotFound) => "not found".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_owned()
                }
            },
            Self::BadRequest(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Forbidden(msg)
            | Self::Unauthorized(msg) => msg.clone(),
            Self::ListEmpty | Self::NothingPurchased => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PaginationError> for AppError {
    fn from(err: PaginationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<QuantityError> for AppError {
    fn from(err: QuantityError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        Self::BadRequest(format!("invalid email: {err}"))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
