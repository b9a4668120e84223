//! Categories and products.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use larder_core::{CategoryId, PantryId, ProductId, Quantity, UserId};

use super::{PgUnitOfWork, metadata, unique_violation};
use crate::db::{CategoryRepository, ProductRepository, RepositoryError};
use crate::models::{Category, NewCategory, NewProduct, Product};

// =============================================================================
// Internal Row Types
// =============================================================================

pub(super) const CATEGORY_COLUMNS: &str =
    "c.id, c.name, c.owner_id, c.metadata, c.created_at, c.updated_at, c.deleted_at";

pub(super) const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.unit, p.default_quantity, \
     p.category_id, p.pantry_id, p.owner_id, p.metadata, p.created_at, p.updated_at, p.deleted_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct CategoryRow {
    id: CategoryId,
    name: String,
    owner_id: UserId,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            metadata: metadata(row.metadata)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    unit: Option<String>,
    default_quantity: Quantity,
    category_id: Option<CategoryId>,
    pantry_id: Option<PantryId>,
    owner_id: UserId,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            unit: row.unit,
            default_quantity: row.default_quantity,
            category_id: row.category_id,
            pantry_id: row.pantry_id,
            owner_id: row.owner_id,
            metadata: metadata(row.metadata)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

// =============================================================================
// Repositories
// =============================================================================

#[async_trait]
impl CategoryRepository for PgUnitOfWork {
    async fn insert_category(
        &mut self,
        category: NewCategory,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO larder.category AS c (name, owner_id, metadata)
             VALUES ($1, $2, $3)
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&category.name)
        .bind(category.owner_id)
        .bind(category.metadata.into_value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation("category name already exists"))?;

        row.try_into()
    }

    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM larder.category c
             WHERE c.id = $1 AND c.deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save_category(&mut self, category: &Category) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE larder.category AS c
             SET name = $2, metadata = $3, deleted_at = $4, updated_at = NOW()
             WHERE c.id = $1
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(category.metadata.to_value())
        .bind(category.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unique_violation("category name already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}

#[async_trait]
impl ProductRepository for PgUnitOfWork {
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO larder.product AS p
                 (name, description, unit, default_quantity, category_id, owner_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.default_quantity)
        .bind(product.category_id)
        .bind(product.owner_id)
        .bind(product.metadata.into_value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation("product name already exists"))?;

        row.try_into()
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM larder.product p
             WHERE p.id = $1 AND p.deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save_product(&mut self, product: &Product) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE larder.product AS p
             SET name = $2, description = $3, unit = $4, default_quantity = $5,
                 category_id = $6, pantry_id = $7, metadata = $8, deleted_at = $9,
                 updated_at = NOW()
             WHERE p.id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.default_quantity)
        .bind(product.category_id)
        .bind(product.pantry_id)
        .bind(product.metadata.to_value())
        .bind(product.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unique_violation("product name already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}
