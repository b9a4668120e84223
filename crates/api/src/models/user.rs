//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{Email, Metadata, UserId};

/// A registered user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address (normalized, unique among live users).
    pub email: Email,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Name shown to people the user shares with.
    pub display_name: String,
    /// Whether the email has been verified.
    pub email_verified: bool,
    /// Caller-defined metadata.
    pub metadata: Metadata,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
    /// Set when the account is deleted.
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub display_name: String,
    pub email_verified: bool,
}

/// The authenticated caller, resolved from a bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The caller's user ID.
    pub id: UserId,
    /// The caller's email.
    pub email: Email,
    /// ID of the token used for this request (for logout).
    pub token_id: String,
    /// When that token expires.
    pub token_expires_at: DateTime<Utc>,
}

/// What a one-time code is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    VerifyEmail,
    ResetPassword,
}

impl CodePurpose {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }
}

impl std::str::FromStr for CodePurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify_email" => Ok(Self::VerifyEmail),
            "reset_password" => Ok(Self::ResetPassword),
            _ => Err(format!("invalid code purpose: {s}")),
        }
    }
}

/// A hashed one-time code. At most one exists per (user, purpose).
#[derive(Debug, Clone)]
pub struct VerificationCode {
    pub user_id: UserId,
    pub purpose: CodePurpose,
    /// SHA-256 hex digest of the code.
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_purpose_roundtrip() {
        for purpose in [CodePurpose::VerifyEmail, CodePurpose::ResetPassword] {
            assert_eq!(purpose.as_str().parse::<CodePurpose>(), Ok(purpose));
        }
        assert!("login".parse::<CodePurpose>().is_err());
    }
}
