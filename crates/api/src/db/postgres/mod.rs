//! `PostgreSQL` implementation of the store traits.
//!
//! Queries are built at runtime (`sqlx::query_as` with `FromRow` row types) and
//! converted into domain models through `TryFrom`, so corrupted rows surface as
//! [`RepositoryError::DataCorruption`] instead of panics.

mod catalog;
mod lists;
mod pantries;
mod purchases;
mod queries;
mod users;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use larder_core::Metadata;

use super::{RepositoryError, Store, UnitOfWork};

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// A database transaction. `sqlx` rolls it back when dropped uncommitted.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

/// Map a unique violation to [`RepositoryError::Conflict`] with `message`.
pub(super) fn unique_violation(message: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Decode a JSONB metadata column.
pub(super) fn metadata(value: Value) -> Result<Metadata, RepositoryError> {
    Metadata::from_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid metadata in database: {e}")))
}

/// `ILIKE` pattern for a substring search.
pub(super) fn contains_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
