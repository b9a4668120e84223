//! Shopping lists and their items.

use chrono::{DateTime, Utc};
use serde::Serialize;

use larder_core::{ListId, ListItemId, Metadata, ProductId, Quantity, UserId};

/// A shopping list.
///
/// Recurring lists reset after purchase; non-recurring lists are archived.
/// The owner never appears in `shared_with`.
#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub id: ListId,
    /// Unique per owner among live lists.
    pub name: String,
    pub description: Option<String>,
    pub recurring: bool,
    pub last_purchased_at: Option<DateTime<Utc>>,
    pub owner_id: UserId,
    pub shared_with: Vec<UserId>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when deleted or archived by a purchase.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a list.
#[derive(Debug, Clone)]
pub struct NewList {
    pub name: String,
    pub description: Option<String>,
    pub recurring: bool,
    pub owner_id: UserId,
    pub metadata: Metadata,
}

/// A product on a list. At most one live item exists per (list, product).
#[derive(Debug, Clone, Serialize)]
pub struct ListItem {
    pub id: ListItemId,
    pub list_id: ListId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit: Option<String>,
    pub purchased: bool,
    pub last_purchased_at: Option<DateTime<Utc>>,
    /// The user who added the item.
    pub owner_id: UserId,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a list item.
#[derive(Debug, Clone)]
pub struct NewListItem {
    pub list_id: ListId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit: Option<String>,
    pub owner_id: UserId,
    pub metadata: Metadata,
}

/// A list together with its live items, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ListDetail {
    #[serde(flatten)]
    pub list: ShoppingList,
    pub items: Vec<ListItem>,
}
