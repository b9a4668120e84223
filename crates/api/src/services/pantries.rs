//! Pantries.
//!
//! Unlike lists, only the owner may change or delete a pantry. Shared users
//! can see it and manage its items.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use larder_core::{Ownership, Page, PantryId, UserId};

use super::access::{accessible_pantry, managed_pantry};
use super::{metadata, optional_text, present, required_name};
use crate::db::Store;
use crate::error::Result;
use crate::models::query::{PageParams, ShareableFilter};
use crate::models::{NewPantry, Pantry, PantryDetail};

/// Body of `POST /pantries`.
#[derive(Debug, Clone, Deserialize)]
pub struct PantryInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Body of `PUT /pantries/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PantryChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
}

/// Pantry operations.
pub struct PantryService<'a> {
    store: &'a dyn Store,
}

impl<'a> PantryService<'a> {
    /// Create a new pantry service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Create a pantry owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid fields and `Conflict` for a duplicate name.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create(&self, user_id: UserId, input: PantryInput) -> Result<Pantry> {
        let new = NewPantry {
            name: required_name("name", &input.name)?,
            description: optional_text(input.description),
            owner_id: user_id,
            metadata: metadata(input.metadata)?,
        };

        let mut uow = self.store.begin().await?;
        let pantry = uow.insert_pantry(new).await?;
        uow.commit().await?;

        tracing::info!(pantry_id = %pantry.id, "Pantry created");
        Ok(pantry)
    }

    /// A pantry with its live items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless the caller owns the pantry or it is shared with them.
    pub async fn get(&self, user_id: UserId, id: PantryId) -> Result<PantryDetail> {
        let mut uow = self.store.begin().await?;
        let pantry = accessible_pantry(uow.as_mut(), id, user_id).await?;
        let items = uow.pantry_items(pantry.id).await?;
        uow.commit().await?;
        Ok(PantryDetail { pantry, items })
    }

    /// Rename or describe a pantry.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for shared users, `NotFound` for strangers,
    /// `BadRequest` or `Conflict`.
    #[instrument(skip(self, changes), fields(user_id = %user_id, pantry_id = %id))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: PantryId,
        changes: PantryChanges,
    ) -> Result<Pantry> {
        let name = changes
            .name
            .as_deref()
            .map(|name| required_name("name", name))
            .transpose()?;
        let metadata = changes.metadata.map(|m| metadata(Some(m))).transpose()?;

        let mut uow = self.store.begin().await?;
        let mut pantry = managed_pantry(uow.as_mut(), id, user_id).await?;
        if let Some(name) = name {
            pantry.name = name;
        }
        if let Some(description) = changes.description {
            pantry.description = optional_text(description);
        }
        if let Some(metadata) = metadata {
            pantry.metadata = metadata;
        }
        let pantry = uow.save_pantry(&pantry).await?;
        uow.commit().await?;

        Ok(pantry)
    }

    /// Soft-delete a pantry.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for shared users and `NotFound` for strangers.
    #[instrument(skip(self), fields(user_id = %user_id, pantry_id = %id))]
    pub async fn delete(&self, user_id: UserId, id: PantryId) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let mut pantry = managed_pantry(uow.as_mut(), id, user_id).await?;
        pantry.deleted_at = Some(Utc::now());
        uow.save_pantry(&pantry).await?;
        uow.commit().await?;

        tracing::info!("Pantry deleted");
        Ok(())
    }

    /// Pantries the caller owns or that are shared with them.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid paging.
    pub async fn page(&self, user_id: UserId, params: &PageParams) -> Result<Page<Pantry>> {
        let listing = params.listing(ShareableFilter {
            user_id,
            search: params.search(),
            ownership: Ownership::from(params.owner),
        })?;
        Ok(self.store.page_pantries(&listing).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::testing;

    fn input(name: &str) -> PantryInput {
        PantryInput {
            name: name.to_owned(),
            description: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_create_trims_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let pantries = PantryService::new(&store);

        let pantry = pantries.create(alice.id, input("  Kitchen ")).await.unwrap();
        assert_eq!(pantry.name, "Kitchen");

        let err = pantries.create(alice.id, input("Kitchen")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = pantries.create(alice.id, input("   ")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_name_is_free_again_after_delete() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let pantries = PantryService::new(&store);

        let pantry = pantries.create(alice.id, input("Kitchen")).await.unwrap();
        pantries.delete(alice.id, pantry.id).await.unwrap();
        pantries.create(alice.id, input("Kitchen")).await.unwrap();
    }

    #[tokio::test]
    async fn test_shared_user_is_forbidden_stranger_not_found() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let eve = testing::user(&store, "eve@example.com").await;
        let pantries = PantryService::new(&store);
        let pantry = pantries.create(alice.id, input("Kitchen")).await.unwrap();
        testing::share_pantry(&store, &pantry, &bob).await;

        let detail = pantries.get(bob.id, pantry.id).await.unwrap();
        assert_eq!(detail.pantry.id, pantry.id);

        let err = pantries
            .update(bob.id, pantry.id, PantryChanges::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err = pantries.delete(bob.id, pantry.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        assert_eq!(
            pantries.get(eve.id, pantry.id).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            pantries.delete(eve.id, pantry.id).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_update_clears_description_with_null() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let pantries = PantryService::new(&store);
        let pantry = pantries
            .create(
                alice.id,
                PantryInput {
                    description: Some("Under the stairs".to_owned()),
                    ..input("Cupboard")
                },
            )
            .await
            .unwrap();

        let changes: PantryChanges =
            serde_json::from_value(json!({"description": null, "metadata": {"floor": 1}}))
                .unwrap();
        let updated = pantries.update(alice.id, pantry.id, changes).await.unwrap();

        assert_eq!(updated.description, None);
        assert_eq!(updated.name, "Cupboard");
        assert_eq!(updated.metadata.get("floor"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_page_searches_names() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let pantries = PantryService::new(&store);
        pantries.create(alice.id, input("Kitchen")).await.unwrap();
        pantries.create(alice.id, input("Garage")).await.unwrap();

        let params = PageParams {
            search: Some("KIT".to_owned()),
            ..PageParams::default()
        };
        let page = pantries.page(alice.id, &params).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].name, "Kitchen");
    }
}
