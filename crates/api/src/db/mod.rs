//! Persistence for Larder.
//!
//! # Database: `larder` schema
//!
//! ## Tables
//!
//! - `user` / `user_code` - Accounts and hashed one-time codes
//! - `category` / `product` - Per-user catalog
//! - `shopping_list` / `list_share` / `shopping_list_item` - Lists
//! - `pantry` / `pantry_share` / `pantry_item` - Pantries
//! - `purchase` / `purchase_item` - Purchase records and item snapshots
//!
//! Every table except the share and code tables is soft-deleted through
//! `deleted_at`. Uniqueness rules ("one live list per name and owner") are
//! partial unique indexes over live rows.
//!
//! # Access
//!
//! Writes go through a [`UnitOfWork`] obtained from [`Store::begin`]. Rows
//! read through a unit of work are locked until it commits or is dropped;
//! dropping it without calling [`UnitOfWork::commit`] rolls everything back.
//! Paginated listings go through [`Queries`] without a transaction.
//!
//! Two implementations exist: [`PgStore`] and [`MemoryStore`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p larder-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use larder_core::{
    CategoryId, Email, ListId, ListItemId, Page, PantryId, PantryItemId, ProductId, PurchaseId,
    UserId,
};

use crate::models::query::{
    CategoryFilter, CategorySort, ListItemFilter, ListItemSort, ListSort, Listing,
    PantryItemFilter, PantryItemSort, PantrySort, ProductFilter, ProductSort, PurchaseSort,
    ShareableFilter,
};
use crate::models::{
    Category, CodePurpose, ListItem, NewCategory, NewList, NewListItem, NewPantry, NewPantryItem,
    NewProduct, NewPurchase, NewUser, Pantry, PantryItem, Product, Purchase, ShoppingList, User,
    VerificationCode,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Per-entity repositories (used inside a unit of work)
// =============================================================================

/// Accounts and one-time codes.
#[async_trait]
pub trait UserRepository {
    /// Insert a user. `Conflict` if a live user has the same email.
    async fn insert_user(&mut self, user: NewUser) -> Result<User, RepositoryError>;
    /// Find a live user.
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError>;
    /// Find a live user by (normalized) email.
    async fn find_user_by_email(&mut self, email: &Email) -> Result<Option<User>, RepositoryError>;
    /// Find every live user whose email is in `emails`.
    async fn find_users_by_emails(
        &mut self,
        emails: &[Email],
    ) -> Result<Vec<User>, RepositoryError>;
    /// Persist every mutable field and refresh `updated_at`.
    async fn save_user(&mut self, user: &User) -> Result<User, RepositoryError>;
    /// Replace the code for `(user, purpose)`.
    async fn store_code(&mut self, code: &VerificationCode) -> Result<(), RepositoryError>;
    /// Look up the code for `(user, purpose)`, expired or not.
    async fn find_code(
        &mut self,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>, RepositoryError>;
    /// Remove the code for `(user, purpose)`.
    async fn delete_code(
        &mut self,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> Result<(), RepositoryError>;
}

/// Categories.
#[async_trait]
pub trait CategoryRepository {
    /// `Conflict` if the owner already has a live category with this name.
    async fn insert_category(&mut self, category: NewCategory)
    -> Result<Category, RepositoryError>;
    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;
    async fn save_category(&mut self, category: &Category) -> Result<Category, RepositoryError>;
}

/// Products.
#[async_trait]
pub trait ProductRepository {
    /// `Conflict` if the owner already has a live product with this name.
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product, RepositoryError>;
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn save_product(&mut self, product: &Product) -> Result<Product, RepositoryError>;
}

/// Shopping lists and their shares.
#[async_trait]
pub trait ListRepository {
    /// `Conflict` if the owner already has a live list with this name.
    async fn insert_list(&mut self, list: NewList) -> Result<ShoppingList, RepositoryError>;
    /// Find a list, optionally including soft-deleted (archived) ones.
    async fn find_list(
        &mut self,
        id: ListId,
        include_deleted: bool,
    ) -> Result<Option<ShoppingList>, RepositoryError>;
    /// Names of the owner's live lists.
    async fn list_names(&mut self, owner_id: UserId) -> Result<Vec<String>, RepositoryError>;
    /// Persist list fields. `shared_with` is managed separately.
    async fn save_list(&mut self, list: &ShoppingList) -> Result<ShoppingList, RepositoryError>;
    async fn add_list_share(&mut self, id: ListId, user_id: UserId)
    -> Result<(), RepositoryError>;
    /// Returns `false` if the user was not shared.
    async fn remove_list_share(
        &mut self,
        id: ListId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;
}

/// Items on shopping lists.
#[async_trait]
pub trait ListItemRepository {
    /// `Conflict` if the list already has a live item for the product.
    async fn insert_list_item(&mut self, item: NewListItem) -> Result<ListItem, RepositoryError>;
    async fn find_list_item(
        &mut self,
        list_id: ListId,
        id: ListItemId,
    ) -> Result<Option<ListItem>, RepositoryError>;
    /// Live items of a list, oldest first.
    async fn list_items(&mut self, list_id: ListId) -> Result<Vec<ListItem>, RepositoryError>;
    async fn save_list_item(&mut self, item: &ListItem) -> Result<ListItem, RepositoryError>;
}

/// Pantries and their shares.
#[async_trait]
pub trait PantryRepository {
    /// `Conflict` if the owner already has a live pantry with this name.
    async fn insert_pantry(&mut self, pantry: NewPantry) -> Result<Pantry, RepositoryError>;
    async fn find_pantry(&mut self, id: PantryId) -> Result<Option<Pantry>, RepositoryError>;
    async fn save_pantry(&mut self, pantry: &Pantry) -> Result<Pantry, RepositoryError>;
    async fn add_pantry_share(
        &mut self,
        id: PantryId,
        user_id: UserId,
    ) -> Result<(), RepositoryError>;
    /// Returns `false` if the user was not shared.
    async fn remove_pantry_share(
        &mut self,
        id: PantryId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;
}

/// Items stocked in pantries.
#[async_trait]
pub trait PantryItemRepository {
    /// `Conflict` if the pantry already has a live item for the product.
    async fn insert_pantry_item(
        &mut self,
        item: NewPantryItem,
    ) -> Result<PantryItem, RepositoryError>;
    async fn find_pantry_item(
        &mut self,
        pantry_id: PantryId,
        id: PantryItemId,
    ) -> Result<Option<PantryItem>, RepositoryError>;
    async fn find_pantry_item_by_product(
        &mut self,
        pantry_id: PantryId,
        product_id: ProductId,
    ) -> Result<Option<PantryItem>, RepositoryError>;
    /// Live items of a pantry, most recently added first.
    async fn pantry_items(&mut self, pantry_id: PantryId)
    -> Result<Vec<PantryItem>, RepositoryError>;
    async fn save_pantry_item(&mut self, item: &PantryItem)
    -> Result<PantryItem, RepositoryError>;
}

/// Purchases and their snapshots.
#[async_trait]
pub trait PurchaseRepository {
    /// Insert a purchase together with its item snapshots.
    async fn insert_purchase(&mut self, purchase: NewPurchase)
    -> Result<Purchase, RepositoryError>;
    async fn find_purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, RepositoryError>;
    /// Persist `list_id`, `restored_at`, `metadata` and `deleted_at`. Snapshots never change.
    async fn save_purchase(&mut self, purchase: &Purchase) -> Result<Purchase, RepositoryError>;
}

// =============================================================================
// Store
// =============================================================================

/// One transaction over every repository.
///
/// Dropping a unit of work without committing rolls it back.
#[async_trait]
pub trait UnitOfWork:
    UserRepository
    + CategoryRepository
    + ProductRepository
    + ListRepository
    + ListItemRepository
    + PantryRepository
    + PantryItemRepository
    + PurchaseRepository
    + Send
{
    /// Make every write of this unit of work durable.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Read-only paginated listings, run outside explicit transactions.
#[async_trait]
pub trait Queries {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn page_categories(
        &self,
        listing: &Listing<CategoryFilter, CategorySort>,
    ) -> Result<Page<Category>, RepositoryError>;

    async fn page_products(
        &self,
        listing: &Listing<ProductFilter, ProductSort>,
    ) -> Result<Page<Product>, RepositoryError>;

    async fn page_lists(
        &self,
        listing: &Listing<ShareableFilter, ListSort>,
    ) -> Result<Page<ShoppingList>, RepositoryError>;

    async fn page_list_items(
        &self,
        listing: &Listing<ListItemFilter, ListItemSort>,
    ) -> Result<Page<ListItem>, RepositoryError>;

    async fn page_pantries(
        &self,
        listing: &Listing<ShareableFilter, PantrySort>,
    ) -> Result<Page<Pantry>, RepositoryError>;

    async fn page_pantry_items(
        &self,
        listing: &Listing<PantryItemFilter, PantryItemSort>,
    ) -> Result<Page<PantryItem>, RepositoryError>;

    /// Purchases owned by `owner`, with their snapshots.
    async fn page_purchases(
        &self,
        listing: &Listing<UserId, PurchaseSort>,
    ) -> Result<Page<Purchase>, RepositoryError>;
}

/// Entry point to persistence shared by every request.
#[async_trait]
pub trait Store: Queries + Send + Sync {
    /// Open a unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}
