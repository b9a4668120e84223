//! Categories and products.
//!
//! Both are private to their owner. Anyone else gets `NotFound`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use larder_core::{CategoryId, Page, ProductId, Quantity, UserId};

use super::{metadata, optional_text, present, required_name, unit};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::query::{CategoryFilter, PageParams, ProductFilter};
use crate::models::{Category, NewCategory, NewProduct, Product};

/// Body of `POST /categories`.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Body of `PUT /categories/{id}`. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
}

/// Body of `POST /products`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub default_quantity: Option<Quantity>,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Body of `PUT /products/{id}`. `null` clears optional fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub unit: Option<Option<String>>,
    pub default_quantity: Option<Quantity>,
    #[serde(default, deserialize_with = "present")]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
}

/// Category and product operations.
pub struct CatalogService<'a> {
    store: &'a dyn Store,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Create a category. `Conflict` if the name is taken.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a blank name or non-object metadata.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_category(&self, user_id: UserId, input: CategoryInput) -> Result<Category> {
        let new = NewCategory {
            name: required_name("name", &input.name)?,
            owner_id: user_id,
            metadata: metadata(input.metadata)?,
        };

        let mut uow = self.store.begin().await?;
        let category = uow.insert_category(new).await?;
        uow.commit().await?;

        tracing::info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    /// Get one of the caller's categories.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if missing or owned by someone else.
    pub async fn category(&self, user_id: UserId, id: CategoryId) -> Result<Category> {
        let mut uow = self.store.begin().await?;
        let category = owned_category(uow.as_mut(), id, user_id).await?;
        uow.commit().await?;
        Ok(category)
    }

    /// Rename a category or replace its metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `BadRequest` or `Conflict`.
    #[instrument(skip(self, changes), fields(user_id = %user_id, category_id = %id))]
    pub async fn update_category(
        &self,
        user_id: UserId,
        id: CategoryId,
        changes: CategoryChanges,
    ) -> Result<Category> {
        let name = changes
            .name
            .as_deref()
            .map(|name| required_name("name", name))
            .transpose()?;
        let metadata = changes.metadata.map(|m| metadata(Some(m))).transpose()?;

        let mut uow = self.store.begin().await?;
        let mut category = owned_category(uow.as_mut(), id, user_id).await?;
        if let Some(name) = name {
            category.name = name;
        }
        if let Some(metadata) = metadata {
            category.metadata = metadata;
        }
        let category = uow.save_category(&category).await?;
        uow.commit().await?;

        Ok(category)
    }

    /// Soft-delete a category. Products keep their `category_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if missing or owned by someone else.
    #[instrument(skip(self), fields(user_id = %user_id, category_id = %id))]
    pub async fn delete_category(&self, user_id: UserId, id: CategoryId) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let mut category = owned_category(uow.as_mut(), id, user_id).await?;
        category.deleted_at = Some(Utc::now());
        uow.save_category(&category).await?;
        uow.commit().await?;
        Ok(())
    }

    /// The caller's categories.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid paging.
    pub async fn categories(&self, user_id: UserId, params: &PageParams) -> Result<Page<Category>> {
        let listing = params.listing(CategoryFilter {
            owner_id: user_id,
            search: params.search(),
        })?;
        Ok(self.store.page_categories(&listing).await?)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid fields, `NotFound` for a category
    /// the caller does not own and `Conflict` for a name already in use.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_product(&self, user_id: UserId, input: ProductInput) -> Result<Product> {
        let new = NewProduct {
            name: required_name("name", &input.name)?,
            description: optional_text(input.description),
            unit: unit(input.unit)?,
            default_quantity: input.default_quantity.unwrap_or_default(),
            category_id: input.category_id,
            owner_id: user_id,
            metadata: metadata(input.metadata)?,
        };

        let mut uow = self.store.begin().await?;
        if let Some(category_id) = new.category_id {
            owned_category(uow.as_mut(), category_id, user_id).await?;
        }
        let product = uow.insert_product(new).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Get one of the caller's products.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if missing or owned by someone else.
    pub async fn product(&self, user_id: UserId, id: ProductId) -> Result<Product> {
        let mut uow = self.store.begin().await?;
        let product = owned_product(uow.as_mut(), id, user_id).await?;
        uow.commit().await?;
        Ok(product)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing product or category, `BadRequest`
    /// for invalid fields and `Conflict` for a name already in use.
    #[instrument(skip(self, changes), fields(user_id = %user_id, product_id = %id))]
    pub async fn update_product(
        &self,
        user_id: UserId,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Product> {
        let name = changes
            .name
            .as_deref()
            .map(|name| required_name("name", name))
            .transpose()?;
        let unit = changes.unit.map(unit).transpose()?;
        let metadata = changes.metadata.map(|m| metadata(Some(m))).transpose()?;

        let mut uow = self.store.begin().await?;
        let mut product = owned_product(uow.as_mut(), id, user_id).await?;

        if let Some(Some(category_id)) = changes.category_id {
            owned_category(uow.as_mut(), category_id, user_id).await?;
        }

        if let Some(name) = name {
            product.name = name;
        }
        if let Some(description) = changes.description {
            product.description = optional_text(description);
        }
        if let Some(unit) = unit {
            product.unit = unit;
        }
        if let Some(quantity) = changes.default_quantity {
            product.default_quantity = quantity;
        }
        if let Some(category_id) = changes.category_id {
            product.category_id = category_id;
        }
        if let Some(metadata) = metadata {
            product.metadata = metadata;
        }

        let product = uow.save_product(&product).await?;
        uow.commit().await?;
        Ok(product)
    }

    /// Soft-delete a product. Items referring to it stay where they are.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if missing or owned by someone else.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %id))]
    pub async fn delete_product(&self, user_id: UserId, id: ProductId) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let mut product = owned_product(uow.as_mut(), id, user_id).await?;
        product.deleted_at = Some(Utc::now());
        uow.save_product(&product).await?;
        uow.commit().await?;
        Ok(())
    }

    /// The caller's products.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid paging.
    pub async fn products(&self, user_id: UserId, params: &PageParams) -> Result<Page<Product>> {
        let listing = params.listing(ProductFilter {
            owner_id: user_id,
            search: params.search(),
            category_id: params.category_id,
        })?;
        Ok(self.store.page_products(&listing).await?)
    }
}

async fn owned_category(
    uow: &mut dyn UnitOfWork,
    id: CategoryId,
    user_id: UserId,
) -> Result<Category> {
    uow.find_category(id)
        .await?
        .filter(|category| category.owner_id == user_id)
        .ok_or_else(|| AppError::not_found("category"))
}

async fn owned_product(uow: &mut dyn UnitOfWork, id: ProductId, user_id: UserId) -> Result<Product> {
    uow.find_product(id)
        .await?
        .filter(|product| product.owner_id == user_id)
        .ok_or_else(|| AppError::not_found("product"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::testing;

    fn category_input(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_owned(),
            metadata: None,
        }
    }

    fn product_input(name: &str) -> ProductInput {
        ProductInput {
            name: name.to_owned(),
            description: None,
            unit: None,
            default_quantity: None,
            category_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_category_names_are_unique_per_owner() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let catalog = CatalogService::new(&store);

        catalog
            .create_category(alice.id, category_input("Dairy"))
            .await
            .unwrap();
        let err = catalog
            .create_category(alice.id, category_input("Dairy"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        catalog
            .create_category(bob.id, category_input("Dairy"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deleted_category_name_can_be_reused() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let catalog = CatalogService::new(&store);

        let dairy = catalog
            .create_category(alice.id, category_input("Dairy"))
            .await
            .unwrap();
        catalog.delete_category(alice.id, dairy.id).await.unwrap();

        catalog
            .create_category(alice.id, category_input("Dairy"))
            .await
            .unwrap();
        assert_eq!(
            catalog.category(alice.id, dairy.id).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_product_defaults_and_foreign_category() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let catalog = CatalogService::new(&store);

        let milk = catalog
            .create_product(alice.id, product_input("  Milk "))
            .await
            .unwrap();
        assert_eq!(milk.name, "Milk");
        assert_eq!(milk.default_quantity, Quantity::ONE);

        let bobs = catalog
            .create_category(bob.id, category_input("Bob's"))
            .await
            .unwrap();
        let err = catalog
            .create_product(
                alice.id,
                ProductInput {
                    category_id: Some(bobs.id),
                    ..product_input("Cheese")
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_product_clears_with_null() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let catalog = CatalogService::new(&store);

        let product = catalog
            .create_product(
                alice.id,
                ProductInput {
                    unit: Some("l".to_owned()),
                    metadata: Some(json!({"brand": "A"})),
                    ..product_input("Milk")
                },
            )
            .await
            .unwrap();

        let changes: ProductChanges =
            serde_json::from_value(json!({"unit": null, "metadata": null})).unwrap();
        let updated = catalog
            .update_product(alice.id, product.id, changes)
            .await
            .unwrap();

        assert_eq!(updated.unit, None);
        assert!(updated.metadata.is_empty());
        assert_eq!(updated.name, "Milk");
    }

    #[tokio::test]
    async fn test_products_are_private() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let catalog = CatalogService::new(&store);

        let milk = catalog
            .create_product(alice.id, product_input("Milk"))
            .await
            .unwrap();

        assert_eq!(
            catalog.product(bob.id, milk.id).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        let page = catalog
            .products(bob.id, &PageParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_product_names_are_unique_among_live_products() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let catalog = CatalogService::new(&store);

        let milk = catalog
            .create_product(alice.id, product_input("Milk"))
            .await
            .unwrap();
        let err = catalog
            .create_product(alice.id, product_input("Milk"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        catalog
            .create_product(bob.id, product_input("Milk"))
            .await
            .unwrap();

        // Renaming onto a taken name conflicts too.
        let bread = catalog
            .create_product(alice.id, product_input("Bread"))
            .await
            .unwrap();
        let changes: ProductChanges = serde_json::from_value(json!({"name": "Milk"})).unwrap();
        let err = catalog
            .update_product(alice.id, bread.id, changes)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        catalog.delete_product(alice.id, milk.id).await.unwrap();
        catalog
            .create_product(alice.id, product_input("Milk"))
            .await
            .unwrap();
    }
}
