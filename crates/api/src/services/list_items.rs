//! Items on shopping lists.
//!
//! Everyone with access to a list may add, change and remove its items.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use larder_core::{ListId, ListItemId, Page, ProductId, Quantity, UserId};

use super::access::{accessible_list, usable_product};
use super::{metadata, present, unit};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::query::{ListItemFilter, PageParams};
use crate::models::{ListItem, NewListItem};

/// Body of `POST /lists/{id}/items`. Quantity and unit default from the product.
#[derive(Debug, Clone, Deserialize)]
pub struct ListItemInput {
    pub product_id: ProductId,
    pub quantity: Option<Quantity>,
    pub unit: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Body of `PUT /lists/{id}/items/{item_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListItemChanges {
    pub product_id: Option<ProductId>,
    pub quantity: Option<Quantity>,
    #[serde(default, deserialize_with = "present")]
    pub unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
}

/// Body of `PATCH /lists/{id}/items/{item_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListItemPatch {
    pub quantity: Option<Quantity>,
    #[serde(default, deserialize_with = "present")]
    pub unit: Option<Option<String>>,
    pub purchased: Option<bool>,
}

/// List item operations.
pub struct ListItemService<'a> {
    store: &'a dyn Store,
}

impl<'a> ListItemService<'a> {
    /// Create a new list item service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Put a product on a list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible list or product and `Conflict`
    /// if the product is already on the list.
    #[instrument(skip(self, input), fields(user_id = %user_id, list_id = %list_id, product_id = %input.product_id))]
    pub async fn add(
        &self,
        user_id: UserId,
        list_id: ListId,
        input: ListItemInput,
    ) -> Result<ListItem> {
        let unit = unit(input.unit)?;
        let metadata = metadata(input.metadata)?;

        let mut uow = self.store.begin().await?;
        let list = accessible_list(uow.as_mut(), list_id, user_id).await?;
        let product = usable_product(uow.as_mut(), input.product_id, user_id, list.owner_id).await?;

        let item = uow
            .insert_list_item(NewListItem {
                list_id: list.id,
                product_id: product.id,
                quantity: input.quantity.unwrap_or(product.default_quantity),
                unit: unit.or(product.unit),
                owner_id: user_id,
                metadata,
            })
            .await?;
        uow.commit().await?;

        tracing::info!(item_id = %item.id, "List item added");
        Ok(item)
    }

    /// One live item of a list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible list or a missing item.
    pub async fn get(&self, user_id: UserId, list_id: ListId, id: ListItemId) -> Result<ListItem> {
        let mut uow = self.store.begin().await?;
        let item = find_item(uow.as_mut(), user_id, list_id, id).await?;
        uow.commit().await?;
        Ok(item)
    }

    /// Replace product, quantity, unit or metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `BadRequest`, or `Conflict` when switching to a
    /// product that is already on the list.
    #[instrument(skip(self, changes), fields(user_id = %user_id, list_id = %list_id, item_id = %id))]
    pub async fn update(
        &self,
        user_id: UserId,
        list_id: ListId,
        id: ListItemId,
        changes: ListItemChanges,
    ) -> Result<ListItem> {
        let unit = changes.unit.map(unit).transpose()?;
        let metadata = changes.metadata.map(|m| metadata(Some(m))).transpose()?;

        let mut uow = self.store.begin().await?;
        let list = accessible_list(uow.as_mut(), list_id, user_id).await?;
        let mut item = uow
            .find_list_item(list.id, id)
            .await?
            .ok_or_else(|| AppError::not_found("list item"))?;

        if let Some(product_id) = changes.product_id
            && product_id != item.product_id
        {
            let product = usable_product(uow.as_mut(), product_id, user_id, list.owner_id).await?;
            item.product_id = product.id;
        }
        if let Some(quantity) = changes.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = unit {
            item.unit = unit;
        }
        if let Some(metadata) = metadata {
            item.metadata = metadata;
        }

        let item = uow.save_list_item(&item).await?;
        uow.commit().await?;
        Ok(item)
    }

    /// Change quantity or unit, or toggle the purchased flag.
    ///
    /// Marking an item purchased stamps `last_purchased_at`; unmarking clears it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `BadRequest`.
    #[instrument(skip(self, patch), fields(user_id = %user_id, list_id = %list_id, item_id = %id))]
    pub async fn patch(
        &self,
        user_id: UserId,
        list_id: ListId,
        id: ListItemId,
        patch: ListItemPatch,
    ) -> Result<ListItem> {
        let unit = patch.unit.map(unit).transpose()?;

        let mut uow = self.store.begin().await?;
        let mut item = find_item(uow.as_mut(), user_id, list_id, id).await?;

        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = unit {
            item.unit = unit;
        }
        if let Some(purchased) = patch.purchased {
            item.purchased = purchased;
            item.last_purchased_at = purchased.then(Utc::now);
        }

        let item = uow.save_list_item(&item).await?;
        uow.commit().await?;
        Ok(item)
    }

    /// Soft-delete an item.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible list or a missing item.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %list_id, item_id = %id))]
    pub async fn delete(&self, user_id: UserId, list_id: ListId, id: ListItemId) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let mut item = find_item(uow.as_mut(), user_id, list_id, id).await?;
        item.deleted_at = Some(Utc::now());
        uow.save_list_item(&item).await?;
        uow.commit().await?;
        Ok(())
    }

    /// Items of a list the caller can access.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible list and `BadRequest` for
    /// invalid paging.
    pub async fn page(
        &self,
        user_id: UserId,
        list_id: ListId,
        params: &PageParams,
    ) -> Result<Page<ListItem>> {
        let listing = params.listing(ListItemFilter {
            list_id,
            search: params.search(),
            purchased: params.purchased,
        })?;

        let mut uow = self.store.begin().await?;
        accessible_list(uow.as_mut(), list_id, user_id).await?;
        uow.commit().await?;

        Ok(self.store.page_list_items(&listing).await?)
    }
}

async fn find_item(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    list_id: ListId,
    id: ListItemId,
) -> Result<ListItem> {
    let list = accessible_list(uow, list_id, user_id).await?;
    uow.find_list_item(list.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("list item"))
}
