//! Pantries and what is stocked in them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use larder_core::{Metadata, PantryId, PantryItemId, ProductId, Quantity, UserId};

/// A place where purchased products are kept.
#[derive(Debug, Clone, Serialize)]
pub struct Pantry {
    pub id: PantryId,
    /// Unique per owner among live pantries.
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub shared_with: Vec<UserId>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a pantry.
#[derive(Debug, Clone)]
pub struct NewPantry {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub metadata: Metadata,
}

/// A stocked product. At most one live item exists per (pantry, product).
#[derive(Debug, Clone, Serialize)]
pub struct PantryItem {
    pub id: PantryItemId,
    pub pantry_id: PantryId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub owner_id: UserId,
    /// Refreshed whenever stock is added, including by transfers.
    pub added_at: DateTime<Utc>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a pantry item.
#[derive(Debug, Clone)]
pub struct NewPantryItem {
    pub pantry_id: PantryId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub owner_id: UserId,
    pub added_at: DateTime<Utc>,
    pub metadata: Metadata,
}

/// A pantry together with its live items, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PantryDetail {
    #[serde(flatten)]
    pub pantry: Pantry,
    pub items: Vec<PantryItem>,
}
