//! Shopping lists, their shares and their items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use larder_core::{ListId, ListItemId, ProductId, Quantity, UserId};

use super::{PgUnitOfWork, metadata, unique_violation};
use crate::db::{ListItemRepository, ListRepository, RepositoryError};
use crate::models::{ListItem, NewList, NewListItem, ShoppingList};

// =============================================================================
// Internal Row Types
// =============================================================================

pub(super) const LIST_COLUMNS: &str = "l.id, l.name, l.description, l.recurring, \
     l.last_purchased_at, l.owner_id, l.metadata, l.created_at, l.updated_at, l.deleted_at, \
     ARRAY(SELECT s.user_id FROM larder.list_share s WHERE s.list_id = l.id ORDER BY s.user_id) \
     AS shared_with";

pub(super) const LIST_ITEM_COLUMNS: &str = "i.id, i.list_id, i.product_id, i.quantity, i.unit, \
     i.purchased, i.last_purchased_at, i.owner_id, i.metadata, i.created_at, i.updated_at, \
     i.deleted_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ListRow {
    id: ListId,
    name: String,
    description: Option<String>,
    recurring: bool,
    last_purchased_at: Option<DateTime<Utc>>,
    owner_id: UserId,
    shared_with: Vec<i32>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ListRow> for ShoppingList {
    type Error = RepositoryError;

    fn try_from(row: ListRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            recurring: row.recurring,
            last_purchased_at: row.last_purchased_at,
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
pub(super) struct ListItemRow {
    id: ListItemId,
    list_id: ListId,
    product_id: ProductId,
    quantity: Quantity,
    unit: Option<String>,
    purchased: bool,
    last_purchased_at: Option<DateTime<Utc>>,
    owner_id: UserId,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ListItemRow> for ListItem {
    type Error = RepositoryError;

    fn try_from(row: ListItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            list_id: row.list_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit: row.unit,
            purchased: row.purchased,
            last_purchased_at: row.last_purchased_at,
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
impl ListRepository for PgUnitOfWork {
    async fn insert_list(&mut self, list: NewList) -> Result<ShoppingList, RepositoryError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "INSERT INTO larder.shopping_list AS l (name, description, recurring, owner_id, metadata)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {LIST_COLUMNS}"
        ))
        .bind(&list.name)
        .bind(&list.description)
        .bind(list.recurring)
        .bind(list.owner_id)
        .bind(list.metadata.into_value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation("list name already exists"))?;

        row.try_into()
    }

    async fn find_list(
        &mut self,
        id: ListId,
        include_deleted: bool,
    ) -> Result<Option<ShoppingList>, RepositoryError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "SELECT {LIST_COLUMNS} FROM larder.shopping_list l
             WHERE l.id = $1 AND ($2 OR l.deleted_at IS NULL)
             FOR UPDATE OF l"
        ))
        .bind(id)
        .bind(include_deleted)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_names(&mut self, owner_id: UserId) -> Result<Vec<String>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM larder.shopping_list
             WHERE owner_id = $1 AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(names)
    }

    async fn save_list(&mut self, list: &ShoppingList) -> Result<ShoppingList, RepositoryError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "UPDATE larder.shopping_list AS l
             SET name = $2, description = $3, recurring = $4, last_purchased_at = $5,
                 metadata = $6, deleted_at = $7, updated_at = NOW()
             WHERE l.id = $1
             RETURNING {LIST_COLUMNS}"
        ))
        .bind(list.id)
        .bind(&list.name)
        .bind(&list.description)
        .bind(list.recurring)
        .bind(list.last_purchased_at)
        .bind(list.metadata.to_value())
        .bind(list.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unique_violation("list name already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn add_list_share(
        &mut self,
        id: ListId,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO larder.list_share (list_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn remove_list_share(
        &mut self,
        id: ListId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM larder.list_share WHERE list_id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ListItemRepository for PgUnitOfWork {
    async fn insert_list_item(&mut self, item: NewListItem) -> Result<ListItem, RepositoryError> {
        let row = sqlx::query_as::<_, ListItemRow>(&format!(
            "INSERT INTO larder.shopping_list_item AS i
                 (list_id, product_id, quantity, unit, owner_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {LIST_ITEM_COLUMNS}"
        ))
        .bind(item.list_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.owner_id)
        .bind(item.metadata.into_value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation("product is already on this list"))?;

        row.try_into()
    }

    async fn find_list_item(
        &mut self,
        list_id: ListId,
        id: ListItemId,
    ) -> Result<Option<ListItem>, RepositoryError> {
        let row = sqlx::query_as::<_, ListItemRow>(&format!(
            "SELECT {LIST_ITEM_COLUMNS} FROM larder.shopping_list_item i
             WHERE i.id = $1 AND i.list_id = $2 AND i.deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(id)
        .bind(list_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_items(&mut self, list_id: ListId) -> Result<Vec<ListItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListItemRow>(&format!(
            "SELECT {LIST_ITEM_COLUMNS} FROM larder.shopping_list_item i
             WHERE i.list_id = $1 AND i.deleted_at IS NULL
             ORDER BY i.created_at, i.id
             FOR UPDATE"
        ))
        .bind(list_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn save_list_item(&mut self, item: &ListItem) -> Result<ListItem, RepositoryError> {
        let row = sqlx::query_as::<_, ListItemRow>(&format!(
            "UPDATE larder.shopping_list_item AS i
             SET product_id = $2, quantity = $3, unit = $4, purchased = $5,
                 last_purchased_at = $6, metadata = $7, deleted_at = $8, updated_at = NOW()
             WHERE i.id = $1
             RETURNING {LIST_ITEM_COLUMNS}"
        ))
        .bind(item.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.purchased)
        .bind(item.last_purchased_at)
        .bind(item.metadata.to_value())
        .bind(item.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unique_violation("product is already on this list"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}
