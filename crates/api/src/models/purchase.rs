//! Purchase records and their item snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use larder_core::{
    ListId, ListItemId, Metadata, ProductId, PurchaseId, PurchaseItemId, Quantity, UserId,
};

/// A completed shopping trip.
///
/// `list_id` may point at a soft-deleted (archived) list. It is re-pointed at
/// the new list when the purchase is restored.
#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub list_id: ListId,
    pub owner_id: UserId,
    pub items: Vec<PurchaseItem>,
    pub metadata: Metadata,
    pub restored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A list item as it was at purchase time.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseItem {
    pub id: PurchaseItemId,
    pub purchase_id: PurchaseId,
    /// The live item this was copied from.
    pub list_item_id: ListItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit: Option<String>,
    pub metadata: Metadata,
    pub purchased_at: DateTime<Utc>,
}

/// Fields needed to insert a purchase.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub list_id: ListId,
    pub owner_id: UserId,
    pub metadata: Metadata,
    pub items: Vec<NewPurchaseItem>,
}

/// Snapshot of one list item.
#[derive(Debug, Clone)]
pub struct NewPurchaseItem {
    pub list_item_id: ListItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit: Option<String>,
    pub metadata: Metadata,
    pub purchased_at: DateTime<Utc>,
}

impl From<&crate::models::ListItem> for NewPurchaseItem {
    fn from(item: &crate::models::ListItem) -> Self {
        Self {
            list_item_id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit: item.unit.clone(),
            metadata: item.metadata.clone(),
            purchased_at: item.last_purchased_at.unwrap_or(item.updated_at),
        }
    }
}
