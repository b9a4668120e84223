//! Pantries, their shares and their items.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use larder_core::{PantryId, PantryItemId, ProductId, Quantity, UserId};

use super::{PgUnitOfWork, metadata, unique_violation};
use crate::db::{PantryItemRepository, PantryRepository, RepositoryError};
use crate::models::{NewPantry, NewPantryItem, Pantry, PantryItem};

// =============================================================================
// Internal Row Types
// =============================================================================

pub(super) const PANTRY_COLUMNS: &str = "pa.id, pa.name, pa.description, pa.owner_id, \
     pa.metadata, pa.created_at, pa.updated_at, pa.deleted_at, \
     ARRAY(SELECT s.user_id FROM larder.pantry_share s WHERE s.pantry_id = pa.id ORDER BY s.user_id) \
     AS shared_with";

pub(super) const PANTRY_ITEM_COLUMNS: &str = "i.id, i.pantry_id, i.product_id, i.quantity, \
     i.unit, i.expiration_date, i.owner_id, i.added_at, i.metadata, i.created_at, i.updated_at, \
     i.deleted_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PantryRow {
    id: PantryId,
    name: String,
    description: Option<String>,
    owner_id: UserId,
    shared_with: Vec<i32>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PantryRow> for Pantry {
    type Error = RepositoryError;

    fn try_from(row: PantryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            shared_with: row.shared_with.into_iter().map(UserId::new).collect(),
            metadata: metadata(row.metadata)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PantryItemRow {
    id: PantryItemId,
    pantry_id: PantryId,
    product_id: ProductId,
    quantity: Quantity,
    unit: Option<String>,
    expiration_date: Option<NaiveDate>,
    owner_id: UserId,
    added_at: DateTime<Utc>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PantryItemRow> for PantryItem {
    type Error = RepositoryError;

    fn try_from(row: PantryItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            pantry_id: row.pantry_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit: row.unit,
            expiration_date: row.expiration_date,
            owner_id: row.owner_id,
            added_at: row.added_at,
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
impl PantryRepository for PgUnitOfWork {
    async fn insert_pantry(&mut self, pantry: NewPantry) -> Result<Pantry, RepositoryError> {
        let row = sqlx::query_as::<_, PantryRow>(&format!(
            "INSERT INTO larder.pantry AS pa (name, description, owner_id, metadata)
             VALUES ($1, $2, $3, $4)
             RETURNING {PANTRY_COLUMNS}"
        ))
        .bind(&pantry.name)
        .bind(&pantry.description)
        .bind(pantry.owner_id)
        .bind(pantry.metadata.into_value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation("pantry name already exists"))?;

        row.try_into()
    }

    async fn find_pantry(&mut self, id: PantryId) -> Result<Option<Pantry>, RepositoryError> {
        let row = sqlx::query_as::<_, PantryRow>(&format!(
            "SELECT {PANTRY_COLUMNS} FROM larder.pantry pa
             WHERE pa.id = $1 AND pa.deleted_at IS NULL
             FOR UPDATE OF pa"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save_pantry(&mut self, pantry: &Pantry) -> Result<Pantry, RepositoryError> {
        let row = sqlx::query_as::<_, PantryRow>(&format!(
            "UPDATE larder.pantry AS pa
             SET name = $2, description = $3, metadata = $4, deleted_at = $5, updated_at = NOW()
             WHERE pa.id = $1
             RETURNING {PANTRY_COLUMNS}"
        ))
        .bind(pantry.id)
        .bind(&pantry.name)
        .bind(&pantry.description)
        .bind(pantry.metadata.to_value())
        .bind(pantry.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unique_violation("pantry name already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn add_pantry_share(
        &mut self,
        id: PantryId,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO larder.pantry_share (pantry_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn remove_pantry_share(
        &mut self,
        id: PantryId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM larder.pantry_share WHERE pantry_id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PantryItemRepository for PgUnitOfWork {
    async fn insert_pantry_item(
        &mut self,
        item: NewPantryItem,
    ) -> Result<PantryItem, RepositoryError> {
        let row = sqlx::query_as::<_, PantryItemRow>(&format!(
            "INSERT INTO larder.pantry_item AS i
                 (pantry_id, product_id, quantity, unit, expiration_date, owner_id, added_at, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PANTRY_ITEM_COLUMNS}"
        ))
        .bind(item.pantry_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.expiration_date)
        .bind(item.owner_id)
        .bind(item.added_at)
        .bind(item.metadata.into_value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation("product is already in this pantry"))?;

        row.try_into()
    }

    async fn find_pantry_item(
        &mut self,
        pantry_id: PantryId,
        id: PantryItemId,
    ) -> Result<Option<PantryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, PantryItemRow>(&format!(
            "SELECT {PANTRY_ITEM_COLUMNS} FROM larder.pantry_item i
             WHERE i.id = $1 AND i.pantry_id = $2 AND i.deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(id)
        .bind(pantry_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_pantry_item_by_product(
        &mut self,
        pantry_id: PantryId,
        product_id: ProductId,
    ) -> Result<Option<PantryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, PantryItemRow>(&format!(
            "SELECT {PANTRY_ITEM_COLUMNS} FROM larder.pantry_item i
             WHERE i.pantry_id = $1 AND i.product_id = $2 AND i.deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(pantry_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn pantry_items(
        &mut self,
        pantry_id: PantryId,
    ) -> Result<Vec<PantryItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, PantryItemRow>(&format!(
            "SELECT {PANTRY_ITEM_COLUMNS} FROM larder.pantry_item i
             WHERE i.pantry_id = $1 AND i.deleted_at IS NULL
             ORDER BY i.added_at DESC, i.id"
        ))
        .bind(pantry_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn save_pantry_item(&mut self, item: &PantryItem) -> Result<PantryItem, RepositoryError> {
        let row = sqlx::query_as::<_, PantryItemRow>(&format!(
            "UPDATE larder.pantry_item AS i
             SET quantity = $2, unit = $3, expiration_date = $4, added_at = $5, metadata = $6,
                 deleted_at = $7, updated_at = NOW()
             WHERE i.id = $1
             RETURNING {PANTRY_ITEM_COLUMNS}"
        ))
        .bind(item.id)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.expiration_date)
        .bind(item.added_at)
        .bind(item.metadata.to_value())
        .bind(item.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}
