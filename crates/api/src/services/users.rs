//! Accounts: registration, email verification, login/logout, password reset
//! and the caller's own profile.
//!
//! Codes are mailed in plain text and stored only as SHA-256 digests. Mail
//! failures never fail a request.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use larder_core::{Email, UserId};

use super::auth::{
    AuthError, RevocationStore, TokenService, generate_code, hash_code, hash_password,
    validate_password, verify_password,
};
use super::email::{Mailer, Notification, notify};
use super::{metadata, present, required_name};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{CodePurpose, CurrentUser, NewUser, User, VerificationCode};

/// Body of `POST /users`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Body of `POST /users/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyInput {
    pub email: String,
    pub code: String,
}

/// Body of `POST /users/verify/resend` and `POST /users/password/forgot`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailInput {
    pub email: String,
}

/// Body of `POST /users/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Body of `POST /users/password/reset`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetInput {
    pub email: String,
    pub code: String,
    pub password: String,
}

/// Body of `PATCH /users/me`. Changing the password needs the current one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}

/// Response of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Account operations.
pub struct UserService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    tokens: &'a TokenService,
    revocations: &'a dyn RevocationStore,
    code_ttl: Duration,
}

impl<'a> UserService<'a> {
    /// Create a new user service. `code_ttl` is how long emailed codes stay valid.
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        mailer: &'a dyn Mailer,
        tokens: &'a TokenService,
        revocations: &'a dyn RevocationStore,
        code_ttl: Duration,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens,
            revocations,
            code_ttl,
        }
    }

    /// Create an unverified account and mail a verification code.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for an invalid email, short password or blank
    /// display name, and `Conflict` if a live account uses the email.
    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<User> {
        let email = Email::parse(&input.email).map_err(AuthError::from)?;
        validate_password(&input.password)?;
        let display_name = required_name("display_name", &input.display_name)?;
        let password_hash = hash_password(&input.password)?;

        let mut uow = self.store.begin().await?;
        if uow.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists.into());
        }
        let user = uow
            .insert_user(NewUser {
                email,
                password_hash,
                display_name,
                email_verified: false,
            })
            .await?;
        let code = self
            .issue_code(uow.as_mut(), user.id, CodePurpose::VerifyEmail)
            .await?;
        uow.commit().await?;

        tracing::info!(user_id = %user.id, "User registered");

        notify(
            self.mailer,
            &user.email,
            Notification::VerificationCode {
                code,
                valid_minutes: self.valid_minutes(),
            },
        )
        .await;

        Ok(user)
    }

    /// Confirm an account with the mailed code.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a wrong or expired code and `Conflict` if the
    /// account is already verified.
    #[instrument(skip(self, input))]
    pub async fn verify(&self, input: VerifyInput) -> Result<User> {
        let email = Email::parse(&input.email).map_err(AuthError::from)?;

        let mut uow = self.store.begin().await?;
        let mut user = uow
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;
        if user.email_verified {
            return Err(AuthError::AlreadyVerified.into());
        }
        redeem_code(uow.as_mut(), user.id, CodePurpose::VerifyEmail, &input.code).await?;
        user.email_verified = true;
        let user = uow.save_user(&user).await?;
        uow.commit().await?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Mail a fresh verification code, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown email and `Conflict` if the account
    /// is already verified.
    #[instrument(skip(self, input))]
    pub async fn resend(&self, input: EmailInput) -> Result<()> {
        let email = Email::parse(&input.email).map_err(AuthError::from)?;

        let mut uow = self.store.begin().await?;
        let user = uow
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if user.email_verified {
            return Err(AuthError::AlreadyVerified.into());
        }
        let code = self
            .issue_code(uow.as_mut(), user.id, CodePurpose::VerifyEmail)
            .await?;
        uow.commit().await?;

        notify(
            self.mailer,
            &user.email,
            Notification::VerificationCode {
                code,
                valid_minutes: self.valid_minutes(),
            },
        )
        .await;
        Ok(())
    }

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for unknown emails, wrong passwords and
    /// unverified accounts.
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome> {
        let email = Email::parse(&input.email).map_err(|_| AuthError::InvalidCredentials)?;

        let mut uow = self.store.begin().await?;
        let user = uow
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        uow.commit().await?;

        verify_password(&input.password, &user.password_hash)?;
        if !user.email_verified {
            return Err(AuthError::EmailNotVerified.into());
        }

        let issued = self.tokens.issue(user.id)?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            token: issued.token,
            expires_at: issued.claims.expires_at(),
            user,
        })
    }

    /// Revoke the token used for this request.
    #[instrument(skip(self, current), fields(user_id = %current.id))]
    pub async fn logout(&self, current: &CurrentUser) {
        self.revocations.revoke(&current.token_id).await;
        tracing::info!("User logged out");
    }

    /// Mail a password reset code if the account exists.
    ///
    /// Succeeds for unknown emails too, so callers cannot probe for accounts.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a malformed email.
    #[instrument(skip(self, input))]
    pub async fn forgot(&self, input: EmailInput) -> Result<()> {
        let email = Email::parse(&input.email).map_err(AuthError::from)?;

        let mut uow = self.store.begin().await?;
        let Some(user) = uow.find_user_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };
        let code = self
            .issue_code(uow.as_mut(), user.id, CodePurpose::ResetPassword)
            .await?;
        uow.commit().await?;

        notify(
            self.mailer,
            &user.email,
            Notification::PasswordReset {
                code,
                valid_minutes: self.valid_minutes(),
            },
        )
        .await;
        Ok(())
    }

    /// Set a new password with a mailed reset code.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a short password or a wrong or expired code.
    #[instrument(skip(self, input))]
    pub async fn reset(&self, input: ResetInput) -> Result<()> {
        let email = Email::parse(&input.email).map_err(AuthError::from)?;
        validate_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        let mut uow = self.store.begin().await?;
        let mut user = uow
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;
        redeem_code(uow.as_mut(), user.id, CodePurpose::ResetPassword, &input.code).await?;
        user.password_hash = password_hash;
        uow.save_user(&user).await?;
        uow.commit().await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// The caller's account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account no longer exists.
    pub async fn me(&self, user_id: UserId) -> Result<User> {
        let mut uow = self.store.begin().await?;
        let user = live_user(uow.as_mut(), user_id).await?;
        uow.commit().await?;
        Ok(user)
    }

    /// Change display name, metadata or password.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid fields, a missing or wrong
    /// `current_password` when changing the password.
    #[instrument(skip(self, changes), fields(user_id = %user_id))]
    pub async fn update_me(&self, user_id: UserId, changes: ProfileChanges) -> Result<User> {
        let display_name = changes
            .display_name
            .as_deref()
            .map(|name| required_name("display_name", name))
            .transpose()?;
        let metadata = changes.metadata.map(|m| metadata(Some(m))).transpose()?;
        if let Some(password) = &changes.password {
            validate_password(password)?;
        }

        let mut uow = self.store.begin().await?;
        let mut user = live_user(uow.as_mut(), user_id).await?;

        if let Some(password) = &changes.password {
            let current = changes.current_password.as_deref().ok_or_else(|| {
                AppError::BadRequest(
                    "current_password is required to change the password".to_owned(),
                )
            })?;
            verify_password(current, &user.password_hash)
                .map_err(|_| AppError::BadRequest("current password is incorrect".to_owned()))?;
            user.password_hash = hash_password(password)?;
        }
        if let Some(display_name) = display_name {
            user.display_name = display_name;
        }
        if let Some(metadata) = metadata {
            user.metadata = metadata;
        }

        let user = uow.save_user(&user).await?;
        uow.commit().await?;
        Ok(user)
    }

    /// Soft-delete the caller's account and revoke the token in use.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account no longer exists.
    #[instrument(skip(self, current), fields(user_id = %current.id))]
    pub async fn delete_me(&self, current: &CurrentUser) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let mut user = live_user(uow.as_mut(), current.id).await?;
        user.deleted_at = Some(Utc::now());
        uow.save_user(&user).await?;
        uow.commit().await?;

        self.revocations.revoke(&current.token_id).await;
        tracing::info!("User deleted");
        Ok(())
    }

    /// Store a new code for `(user, purpose)` and return it in plain text.
    async fn issue_code(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> Result<String> {
        let code = generate_code();
        let ttl = TimeDelta::from_std(self.code_ttl).unwrap_or(TimeDelta::hours(1));
        uow.store_code(&VerificationCode {
            user_id,
            purpose,
            code_hash: hash_code(&code),
            expires_at: Utc::now() + ttl,
        })
        .await?;
        Ok(code)
    }

    const fn valid_minutes(&self) -> u64 {
        self.code_ttl.as_secs() / 60
    }
}

/// Check a code and consume it. Wrong, missing and expired codes all give
/// `InvalidCode`.
async fn redeem_code(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    purpose: CodePurpose,
    code: &str,
) -> Result<()> {
    let stored = uow
        .find_code(user_id, purpose)
        .await?
        .filter(|stored| stored.expires_at > Utc::now() && stored.code_hash == hash_code(code))
        .ok_or(AuthError::InvalidCode)?;
    uow.delete_code(stored.user_id, stored.purpose).await?;
    Ok(())
}

async fn live_user(uow: &mut dyn UnitOfWork, user_id: UserId) -> Result<User> {
    uow.find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))
}
