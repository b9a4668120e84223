//! Products and the categories they are filed under.

use chrono::{DateTime, Utc};
use serde::Serialize;

use larder_core::{CategoryId, Metadata, PantryId, ProductId, Quantity, UserId};

/// A user-defined category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique per owner among live categories.
    pub name: String,
    pub owner_id: UserId,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub owner_id: UserId,
    pub metadata: Metadata,
}

/// Something that can be put on a list or kept in a pantry.
///
/// A product belongs to exactly one owner. Its `unit` and `default_quantity`
/// seed new list items when the caller omits them.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub default_quantity: Quantity,
    pub category_id: Option<CategoryId>,
    /// Last pantry this product was transferred into.
    pub pantry_id: Option<PantryId>,
    pub owner_id: UserId,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub default_quantity: Quantity,
    pub category_id: Option<CategoryId>,
    pub owner_id: UserId,
    pub metadata: Metadata,
}
