//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] larder_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Login attempted before the email was verified.
    #[error("email not verified")]
    EmailNotVerified,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Verification requested for an already verified account.
    #[error("email already verified")]
    AlreadyVerified,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// One-time code missing, wrong or expired.
    #[error("invalid or expired code")]
    InvalidCode,

    /// Bearer token malformed, forged or expired.
    #[error("invalid token")]
    InvalidToken,

    /// Bearer token was revoked by logout.
    #[error("token revoked")]
    TokenRevoked,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
