//! Shopping lists.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use larder_core::{ListId, Ownership, Page, UserId};

use super::access::{accessible_list, owned_list};
use super::{metadata, optional_text, present, required_name};
use crate::db::Store;
use crate::error::Result;
use crate::models::query::{PageParams, ShareableFilter};
use crate::models::{ListDetail, NewList, ShoppingList};

/// Body of `POST /lists`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Body of `PUT /lists/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub recurring: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
}

/// List operations.
pub struct ListService<'a> {
    store: &'a dyn Store,
}

impl<'a> ListService<'a> {
    /// Create a new list service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Create a list owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid fields and `Conflict` if the caller
    /// already has a live list with this name.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create(&self, user_id: UserId, input: ListInput) -> Result<ShoppingList> {
        let new = NewList {
            name: required_name("name", &input.name)?,
            description: optional_text(input.description),
            recurring: input.recurring,
            owner_id: user_id,
            metadata: metadata(input.metadata)?,
        };

        let mut uow = self.store.begin().await?;
        let list = uow.insert_list(new).await?;
        uow.commit().await?;

        tracing::info!(list_id = %list.id, recurring = list.recurring, "List created");
        Ok(list)
    }

    /// A list with its live items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless the caller owns the list or it is shared with them.
    pub async fn get(&self, user_id: UserId, id: ListId) -> Result<ListDetail> {
        let mut uow = self.store.begin().await?;
        let list = accessible_list(uow.as_mut(), id, user_id).await?;
        let items = uow.list_items(list.id).await?;
        uow.commit().await?;
        Ok(ListDetail { list, items })
    }

    /// Update a list. Allowed for the owner and every shared user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `BadRequest` or `Conflict`.
    #[instrument(skip(self, changes), fields(user_id = %user_id, list_id = %id))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: ListId,
        changes: ListChanges,
    ) -> Result<ShoppingList> {
        let name = changes
            .name
            .as_deref()
            .map(|name| required_name("name", name))
            .transpose()?;
        let metadata = changes.metadata.map(|m| metadata(Some(m))).transpose()?;

        let mut uow = self.store.begin().await?;
        let mut list = accessible_list(uow.as_mut(), id, user_id).await?;
        if let Some(name) = name {
            list.name = name;
        }
        if let Some(description) = changes.description {
            list.description = optional_text(description);
        }
        if let Some(recurring) = changes.recurring {
            list.recurring = recurring;
        }
        if let Some(metadata) = metadata {
            list.metadata = metadata;
        }
        let list = uow.save_list(&list).await?;
        uow.commit().await?;

        Ok(list)
    }

    /// Soft-delete a list. Owner only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for anyone but the owner.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %id))]
    pub async fn delete(&self, user_id: UserId, id: ListId) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let mut list = owned_list(uow.as_mut(), id, user_id).await?;
        list.deleted_at = Some(Utc::now());
        uow.save_list(&list).await?;
        uow.commit().await?;

        tracing::info!("List deleted");
        Ok(())
    }

    /// Lists the caller owns or that are shared with them.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid paging.
    pub async fn page(&self, user_id: UserId, params: &PageParams) -> Result<Page<ShoppingList>> {
        let listing = params.listing(ShareableFilter {
            user_id,
            search: params.search(),
            ownership: Ownership::from(params.owner),
        })?;
        Ok(self.store.page_lists(&listing).await?)
    }
}
