//! Items stocked in pantries.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use larder_core::{Page, PantryId, PantryItemId, ProductId, Quantity, UserId};

use super::access::{accessible_pantry, usable_product};
use super::{metadata, present, unit};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::query::{PageParams, PantryItemFilter};
use crate::models::{NewPantryItem, PantryItem};

/// Body of `POST /pantries/{id}/items`. Quantity and unit default from the product.
#[derive(Debug, Clone, Deserialize)]
pub struct PantryItemInput {
    pub product_id: ProductId,
    pub quantity: Option<Quantity>,
    pub unit: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Body of `PATCH /pantries/{id}/items/{item_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PantryItemPatch {
    pub quantity: Option<Quantity>,
    #[serde(default, deserialize_with = "present")]
    pub unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub expiration_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
}

/// Pantry item operations.
pub struct PantryItemService<'a> {
    store: &'a dyn Store,
}

impl<'a> PantryItemService<'a> {
    /// Create a new pantry item service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Stock a product in a pantry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible pantry or product and
    /// `Conflict` if the product is already stocked there.
    #[instrument(skip(self, input), fields(user_id = %user_id, pantry_id = %pantry_id, product_id = %input.product_id))]
    pub async fn add(
        &self,
        user_id: UserId,
        pantry_id: PantryId,
        input: PantryItemInput,
    ) -> Result<PantryItem> {
        let unit = unit(input.unit)?;
        let metadata = metadata(input.metadata)?;

        let mut uow = self.store.begin().await?;
        let pantry = accessible_pantry(uow.as_mut(), pantry_id, user_id).await?;
        let product =
            usable_product(uow.as_mut(), input.product_id, user_id, pantry.owner_id).await?;

        let item = uow
            .insert_pantry_item(NewPantryItem {
                pantry_id: pantry.id,
                product_id: product.id,
                quantity: input.quantity.unwrap_or(product.default_quantity),
                unit: unit.or(product.unit),
                expiration_date: input.expiration_date,
                owner_id: user_id,
                added_at: Utc::now(),
                metadata,
            })
            .await?;
        uow.commit().await?;

        tracing::info!(item_id = %item.id, "Pantry item added");
        Ok(item)
    }

    /// One live item of a pantry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible pantry or a missing item.
    pub async fn get(
        &self,
        user_id: UserId,
        pantry_id: PantryId,
        id: PantryItemId,
    ) -> Result<PantryItem> {
        let mut uow = self.store.begin().await?;
        let item = find_item(uow.as_mut(), user_id, pantry_id, id).await?;
        uow.commit().await?;
        Ok(item)
    }

    /// Change quantity, unit, expiration date or metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `BadRequest`.
    #[instrument(skip(self, patch), fields(user_id = %user_id, pantry_id = %pantry_id, item_id = %id))]
    pub async fn patch(
        &self,
        user_id: UserId,
        pantry_id: PantryId,
        id: PantryItemId,
        patch: PantryItemPatch,
    ) -> Result<PantryItem> {
        let unit = patch.unit.map(unit).transpose()?;
        let metadata = patch.metadata.map(|m| metadata(Some(m))).transpose()?;

        let mut uow = self.store.begin().await?;
        let mut item = find_item(uow.as_mut(), user_id, pantry_id, id).await?;

        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = unit {
            item.unit = unit;
        }
        if let Some(expiration_date) = patch.expiration_date {
            item.expiration_date = expiration_date;
        }
        if let Some(metadata) = metadata {
            item.metadata = metadata;
        }

        let item = uow.save_pantry_item(&item).await?;
        uow.commit().await?;
        Ok(item)
    }

    /// Soft-delete an item.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible pantry or a missing item.
    #[instrument(skip(self), fields(user_id = %user_id, pantry_id = %pantry_id, item_id = %id))]
    pub async fn delete(
        &self,
        user_id: UserId,
        pantry_id: PantryId,
        id: PantryItemId,
    ) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let mut item = find_item(uow.as_mut(), user_id, pantry_id, id).await?;
        item.deleted_at = Some(Utc::now());
        uow.save_pantry_item(&item).await?;
        uow.commit().await?;
        Ok(())
    }

    /// Items of a pantry the caller can access.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible pantry and `BadRequest` for
    /// invalid paging.
    pub async fn page(
        &self,
        user_id: UserId,
        pantry_id: PantryId,
        params: &PageParams,
    ) -> Result<Page<PantryItem>> {
        let listing = params.listing(PantryItemFilter {
            pantry_id,
            search: params.search(),
            category_id: params.category_id,
        })?;

        let mut uow = self.store.begin().await?;
        accessible_pantry(uow.as_mut(), pantry_id, user_id).await?;
        uow.commit().await?;

        Ok(self.store.page_pantry_items(&listing).await?)
    }
}

async fn find_item(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    pantry_id: PantryId,
    id: PantryItemId,
) -> Result<PantryItem> {
    let pantry = accessible_pantry(uow, pantry_id, user_id).await?;
    uow.find_pantry_item(pantry.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("pantry item"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::testing;

    fn input(product_id: ProductId) -> PantryItemInput {
        PantryItemInput {
            product_id,
            quantity: None,
            unit: None,
            expiration_date: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_add_defaults_and_conflicts_per_product() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let rice = testing::product(&store, &alice, "Rice").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let items = PantryItemService::new(&store);

        let item = items.add(alice.id, pantry.id, input(rice.id)).await.unwrap();
        assert_eq!(item.quantity, rice.default_quantity);
        assert_eq!(item.unit.as_deref(), Some("pcs"));
        assert_eq!(item.owner_id, alice.id);

        let err = items
            .add(alice.id, pantry.id, input(rice.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_shared_user_manages_items_with_either_owners_products() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let eve = testing::user(&store, "eve@example.com").await;
        let rice = testing::product(&store, &alice, "Rice").await;
        let beans = testing::product(&store, &bob, "Beans").await;
        let salt = testing::product(&store, &eve, "Salt").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        testing::share_pantry(&store, &pantry, &bob).await;
        let items = PantryItemService::new(&store);

        items.add(bob.id, pantry.id, input(rice.id)).await.unwrap();
        let added = items.add(bob.id, pantry.id, input(beans.id)).await.unwrap();
        items.delete(bob.id, pantry.id, added.id).await.unwrap();

        let err = items
            .add(bob.id, pantry.id, input(salt.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = items
            .add(eve.id, pantry.id, input(salt.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_distinguishes_null_from_absent() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let rice = testing::product(&store, &alice, "Rice").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let items = PantryItemService::new(&store);
        let item = items
            .add(
                alice.id,
                pantry.id,
                PantryItemInput {
                    expiration_date: NaiveDate::from_ymd_opt(2026, 12, 31),
                    ..input(rice.id)
                },
            )
            .await
            .unwrap();

        let patch: PantryItemPatch = serde_json::from_value(json!({"quantity": 2.5})).unwrap();
        let patched = items.patch(alice.id, pantry.id, item.id, patch).await.unwrap();
        assert_eq!(patched.quantity.to_string(), "2.5");
        assert_eq!(patched.expiration_date, NaiveDate::from_ymd_opt(2026, 12, 31));
        assert_eq!(patched.unit.as_deref(), Some("pcs"));

        let patch: PantryItemPatch =
            serde_json::from_value(json!({"expiration_date": null, "unit": null})).unwrap();
        let patched = items.patch(alice.id, pantry.id, item.id, patch).await.unwrap();
        assert_eq!(patched.expiration_date, None);
        assert_eq!(patched.unit, None);
    }

    #[tokio::test]
    async fn test_deleted_item_is_gone() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let rice = testing::product(&store, &alice, "Rice").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let items = PantryItemService::new(&store);
        let item = items.add(alice.id, pantry.id, input(rice.id)).await.unwrap();

        items.delete(alice.id, pantry.id, item.id).await.unwrap();
        let err = items.get(alice.id, pantry.id, item.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        // The product may be stocked again.
        items.add(alice.id, pantry.id, input(rice.id)).await.unwrap();
        let page = items
            .page(alice.id, pantry.id, &PageParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
