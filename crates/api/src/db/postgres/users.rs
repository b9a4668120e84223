//! Users and their one-time codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use larder_core::{Email, UserId};

use super::{PgUnitOfWork, metadata, unique_violation};
use crate::db::{RepositoryError, UserRepository};
use crate::models::{CodePurpose, NewUser, User, VerificationCode};

// =============================================================================
// Internal Row Types
// =============================================================================

const USER_COLUMNS: &str = "id, email, password_hash, display_name, email_verified, metadata, \
                            created_at, updated_at, deleted_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    password_hash: String,
    display_name: String,
    email_verified: bool,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            email_verified: row.email_verified,
            metadata: metadata(row.metadata)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CodeRow {
    user_id: i32,
    purpose: String,
    code_hash: String,
    expires_at: DateTime<Utc>,
}

impl TryFrom<CodeRow> for VerificationCode {
    type Error = RepositoryError;

    fn try_from(row: CodeRow) -> Result<Self, Self::Error> {
        let purpose = row
            .purpose
            .parse::<CodePurpose>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            user_id: UserId::new(row.user_id),
            purpose,
            code_hash: row.code_hash,
            expires_at: row.expires_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl UserRepository for PgUnitOfWork {
    async fn insert_user(&mut self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO larder.user (email, password_hash, display_name, email_verified)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.email_verified)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation("email already registered"))?;

        row.try_into()
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM larder.user
             WHERE id = $1 AND deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_user_by_email(&mut self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM larder.user
             WHERE LOWER(email) = $1 AND deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(email.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_users_by_emails(
        &mut self,
        emails: &[Email],
    ) -> Result<Vec<User>, RepositoryError> {
        let emails: Vec<String> = emails.iter().map(|e| e.as_str().to_owned()).collect();

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM larder.user
             WHERE LOWER(email) = ANY($1) AND deleted_at IS NULL
             ORDER BY id"
        ))
        .bind(emails)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn save_user(&mut self, user: &User) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE larder.user
             SET email = $2, password_hash = $3, display_name = $4, email_verified = $5,
                 metadata = $6, deleted_at = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.email_verified)
        .bind(user.metadata.to_value())
        .bind(user.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unique_violation("email already registered"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn store_code(&mut self, code: &VerificationCode) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO larder.user_code (user_id, purpose, code_hash, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, purpose)
             DO UPDATE SET code_hash = EXCLUDED.code_hash,
                           expires_at = EXCLUDED.expires_at,
                           created_at = NOW()",
        )
        .bind(code.user_id)
        .bind(code.purpose.as_str())
        .bind(&code.code_hash)
        .bind(code.expires_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_code(
        &mut self,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>, RepositoryError> {
        let row = sqlx::query_as::<_, CodeRow>(
            "SELECT user_id, purpose, code_hash, expires_at
             FROM larder.user_code
             WHERE user_id = $1 AND purpose = $2
             FOR UPDATE",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn delete_code(
        &mut self,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM larder.user_code WHERE user_id = $1 AND purpose = $2")
            .bind(user_id)
            .bind(purpose.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }
}
