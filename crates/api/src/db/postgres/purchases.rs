//! Purchases and their item snapshots.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgExecutor;

use larder_core::{ListId, ListItemId, ProductId, PurchaseId, PurchaseItemId, Quantity, UserId};

use super::{PgUnitOfWork, metadata};
use crate::db::{PurchaseRepository, RepositoryError};
use crate::models::{NewPurchase, Purchase, PurchaseItem};

// =============================================================================
// Internal Row Types
// =============================================================================

pub(super) const PURCHASE_COLUMNS: &str = "pu.id, pu.list_id, pu.owner_id, pu.metadata, \
     pu.restored_at, pu.created_at, pu.updated_at, pu.deleted_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PurchaseRow {
    id: PurchaseId,
    list_id: ListId,
    owner_id: UserId,
    metadata: Value,
    restored_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl PurchaseRow {
    pub(super) const fn id(&self) -> PurchaseId {
        self.id
    }

    pub(super) fn into_purchase(
        self,
        items: Vec<PurchaseItem>,
    ) -> Result<Purchase, RepositoryError> {
        Ok(Purchase {
            id: self.id,
            list_id: self.list_id,
            owner_id: self.owner_id,
            items,
            metadata: metadata(self.metadata)?,
            restored_at: self.restored_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseItemRow {
    id: PurchaseItemId,
    purchase_id: PurchaseId,
    list_item_id: ListItemId,
    product_id: ProductId,
    quantity: Quantity,
    unit: Option<String>,
    metadata: Value,
    purchased_at: DateTime<Utc>,
}

impl TryFrom<PurchaseItemRow> for PurchaseItem {
    type Error = RepositoryError;

    fn try_from(row: PurchaseItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            purchase_id: row.purchase_id,
            list_item_id: row.list_item_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit: row.unit,
            metadata: metadata(row.metadata)?,
            purchased_at: row.purchased_at,
        })
    }
}

/// Load the snapshots of several purchases, grouped by purchase.
pub(super) async fn load_items<'e>(
    executor: impl PgExecutor<'e>,
    purchase_ids: &[PurchaseId],
) -> Result<HashMap<PurchaseId, Vec<PurchaseItem>>, RepositoryError> {
    let ids: Vec<i32> = purchase_ids.iter().map(PurchaseId::as_i32).collect();

    let rows = sqlx::query_as::<_, PurchaseItemRow>(
        "SELECT id, purchase_id, list_item_id, product_id, quantity, unit, metadata, purchased_at
         FROM larder.purchase_item
         WHERE purchase_id = ANY($1)
         ORDER BY id",
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<PurchaseId, Vec<PurchaseItem>> = HashMap::new();
    for row in rows {
        let item = PurchaseItem::try_from(row)?;
        grouped.entry(item.purchase_id).or_default().push(item);
    }
    Ok(grouped)
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl PurchaseRepository for PgUnitOfWork {
    async fn insert_purchase(
        &mut self,
        purchase: NewPurchase,
    ) -> Result<Purchase, RepositoryError> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "INSERT INTO larder.purchase AS pu (list_id, owner_id, metadata)
             VALUES ($1, $2, $3)
             RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(purchase.list_id)
        .bind(purchase.owner_id)
        .bind(purchase.metadata.into_value())
        .fetch_one(&mut *self.tx)
        .await?;

        let mut items = Vec::with_capacity(purchase.items.len());
        for item in purchase.items {
            let item_row = sqlx::query_as::<_, PurchaseItemRow>(
                "INSERT INTO larder.purchase_item
                     (purchase_id, list_item_id, product_id, quantity, unit, metadata, purchased_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING id, purchase_id, list_item_id, product_id, quantity, unit, metadata,
                           purchased_at",
            )
            .bind(row.id())
            .bind(item.list_item_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(&item.unit)
            .bind(item.metadata.into_value())
            .bind(item.purchased_at)
            .fetch_one(&mut *self.tx)
            .await?;

            items.push(item_row.try_into()?);
        }

        row.into_purchase(items)
    }

    async fn find_purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM larder.purchase pu
             WHERE pu.id = $1 AND pu.deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let mut items = load_items(&mut *self.tx, &[id]).await?;
        row.into_purchase(items.remove(&id).unwrap_or_default())
            .map(Some)
    }

    async fn save_purchase(&mut self, purchase: &Purchase) -> Result<Purchase, RepositoryError> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "UPDATE larder.purchase AS pu
             SET list_id = $2, metadata = $3, restored_at = $4, deleted_at = $5,
                 updated_at = NOW()
             WHERE pu.id = $1
             RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(purchase.id)
        .bind(purchase.list_id)
        .bind(purchase.metadata.to_value())
        .bind(purchase.restored_at)
        .bind(purchase.deleted_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.into_purchase(purchase.items.clone())
    }
}
