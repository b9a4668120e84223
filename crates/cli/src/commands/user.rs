//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a user who can log in right away
//! larder-cli user create -e ana@example.com -n "Ana" -p "correct horse" --verified
//!
//! # Mark an existing user's email as verified
//! larder-cli user verify -e ana@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `LARDER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use larder_api::db::{self, PgStore, RepositoryError, Store};
use larder_api::models::NewUser;
use larder_api::services::auth::{self, AuthError};
use larder_core::{Email, EmailError, UserId};
use secrecy::SecretString;
use thiserror::Error;

use super::migrate::database_url;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),

    /// Store error.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password rejected or could not be hashed.
    #[error("{0}")]
    Password(#[from] AuthError),

    /// Display name is blank.
    #[error("Display name must not be empty")]
    BlankName,

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(Email),

    /// No such user.
    #[error("No user with email: {0}")]
    UserNotFound(Email),
}

async fn connect() -> Result<PgStore, UserError> {
    let url = database_url().ok_or(UserError::MissingEnvVar("LARDER_DATABASE_URL"))?;
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&SecretString::from(url)).await?;
    Ok(PgStore::new(pool))
}

/// Create a new user.
///
/// # Returns
///
/// The ID of the created user.
pub async fn create(
    email: &str,
    name: &str,
    password: &str,
    verified: bool,
) -> Result<UserId, UserError> {
    let email = Email::parse(email)?;
    let display_name = name.trim();
    if display_name.is_empty() {
        return Err(UserError::BlankName);
    }
    auth::validate_password(password)?;
    let password_hash = auth::hash_password(password)?;

    let store = connect().await?;
    let mut uow = store.begin().await?;

    if uow.find_user_by_email(&email).await?.is_some() {
        return Err(UserError::UserExists(email));
    }

    let user = uow
        .insert_user(NewUser {
            email,
            password_hash,
            display_name: display_name.to_owned(),
            email_verified: verified,
        })
        .await?;
    uow.commit().await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Verified: {}",
        user.id,
        user.email,
        user.email_verified
    );
    if !verified {
        tracing::warn!("User is not verified. Run 'user verify' before they can log in.");
    }

    Ok(user.id)
}

/// Mark a user's email as verified.
pub async fn verify(email: &str) -> Result<(), UserError> {
    let email = Email::parse(email)?;

    let store = connect().await?;
    let mut uow = store.begin().await?;

    let Some(mut user) = uow.find_user_by_email(&email).await? else {
        return Err(UserError::UserNotFound(email));
    };

    if user.email_verified {
        tracing::info!("User {} is already verified", user.email);
        return Ok(());
    }

    user.email_verified = true;
    uow.save_user(&user).await?;
    uow.commit().await?;

    tracing::info!("User {} verified", user.email);
    Ok(())
}
