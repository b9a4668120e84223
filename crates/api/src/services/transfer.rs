//! Moving purchased list items into a pantry.
//!
//! Each purchased item is merged into the pantry's item for the same product,
//! or becomes a new pantry item. Merging adds the quantities, takes the
//! incoming unit when one is given and shallow-merges metadata with the
//! incoming keys winning. The list itself is left untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use larder_core::{ListId, PantryId, UserId};

use super::access::{accessible_pantry, owned_list};
use super::optional_text;
use crate::db::Store;
use crate::error::Result;
use crate::models::{NewPantryItem, PantryItem};

/// Metadata key that receives the transfer notes.
pub const TRANSFER_NOTES_KEY: &str = "transfer_notes";

/// Body of `POST /lists/{id}/transfer`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferInput {
    pub pantry_id: PantryId,
    pub notes: Option<String>,
}

/// The pantry items created or updated by a transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub pantry_id: PantryId,
    pub items: Vec<PantryItem>,
}

/// Transfer operations.
pub struct TransferService<'a> {
    store: &'a dyn Store,
}

impl<'a> TransferService<'a> {
    /// Create a new transfer service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Move the purchased items of a list into a pantry.
    ///
    /// A list without purchased items gives an empty result.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless the caller owns the list and can access the
    /// pantry, and `BadRequest` if a merged quantity would overflow.
    #[instrument(skip(self, input), fields(user_id = %user_id, list_id = %list_id, pantry_id = %input.pantry_id))]
    pub async fn transfer(
        &self,
        user_id: UserId,
        list_id: ListId,
        input: TransferInput,
    ) -> Result<TransferOutcome> {
        let notes = optional_text(input.notes);

        let mut uow = self.store.begin().await?;
        let list = owned_list(uow.as_mut(), list_id, user_id).await?;
        let pantry = accessible_pantry(uow.as_mut(), input.pantry_id, user_id).await?;

        let purchased: Vec<_> = uow
            .list_items(list.id)
            .await?
            .into_iter()
            .filter(|item| item.purchased)
            .collect();

        let now = Utc::now();
        let mut touched = Vec::with_capacity(purchased.len());

        for item in purchased {
            let product = uow.find_product(item.product_id).await?;

            let stocked = match uow
                .find_pantry_item_by_product(pantry.id, item.product_id)
                .await?
            {
                Some(mut existing) => {
                    existing.quantity = existing.quantity.checked_add(item.quantity)?;
                    if let Some(unit) = &item.unit
                        && existing.unit.as_ref() != Some(unit)
                    {
                        existing.unit = Some(unit.clone());
                    }
                    existing.metadata.merge(&item.metadata);
                    if let Some(notes) = &notes {
                        existing.metadata.insert(TRANSFER_NOTES_KEY, notes.as_str());
                    }
                    existing.added_at = now;
                    uow.save_pantry_item(&existing).await?
                }
                None => {
                    let mut metadata = item.metadata.clone();
                    if let Some(notes) = &notes {
                        metadata.insert(TRANSFER_NOTES_KEY, notes.as_str());
                    }
                    uow.insert_pantry_item(NewPantryItem {
                        pantry_id: pantry.id,
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit: item
                            .unit
                            .clone()
                            .or_else(|| product.as_ref().and_then(|p| p.unit.clone())),
                        expiration_date: None,
                        owner_id: user_id,
                        added_at: now,
                        metadata,
                    })
                    .await?
                }
            };

            if let Some(mut product) = product
                && product.pantry_id != Some(pantry.id)
            {
                product.pantry_id = Some(pantry.id);
                uow.save_product(&product).await?;
            }

            touched.push(stocked);
        }

        uow.commit().await?;

        tracing::info!(items = touched.len(), "Items transferred to pantry");

        Ok(TransferOutcome {
            pantry_id: pantry.id,
            items: touched,
        })
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

    fn input(pantry_id: PantryId) -> TransferInput {
        TransferInput {
            pantry_id,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_milk_two_plus_three_is_five() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 3, true).await;

        let mut uow = store.begin().await.unwrap();
        uow.insert_pantry_item(NewPantryItem {
            pantry_id: pantry.id,
            product_id: milk.id,
            quantity: testing::qty(2),
            unit: Some("l".to_owned()),
            expiration_date: None,
            owner_id: alice.id,
            added_at: Utc::now(),
            metadata: larder_core::Metadata::new(),
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();

        let outcome = TransferService::new(&store)
            .transfer(alice.id, list.id, input(pantry.id))
            .await
            .unwrap();

        assert_eq!(outcome.pantry_id, pantry.id);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].quantity, testing::qty(5));
        // Incoming item has no unit, so the pantry keeps its own.
        assert_eq!(outcome.items[0].unit.as_deref(), Some("l"));

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.pantry_items(pantry.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transferring_twice_accumulates() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 2, true).await;
        let transfers = TransferService::new(&store);

        transfers
            .transfer(alice.id, list.id, input(pantry.id))
            .await
            .unwrap();
        let outcome = transfers
            .transfer(alice.id, list.id, input(pantry.id))
            .await
            .unwrap();

        assert_eq!(outcome.items[0].quantity, testing::qty(4));
        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.pantry_items(pantry.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_new_item_takes_product_unit_notes_and_back_reference() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let bread = testing::product(&store, &alice, "Bread").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 1, true).await;
        testing::item(&store, &list, &bread, 1, false).await;

        let outcome = TransferService::new(&store)
            .transfer(
                alice.id,
                list.id,
                TransferInput {
                    pantry_id: pantry.id,
                    notes: Some("from the market".to_owned()),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 1);
        let stocked = &outcome.items[0];
        assert_eq!(stocked.product_id, milk.id);
        assert_eq!(stocked.unit.as_deref(), Some("pcs"));
        assert_eq!(stocked.owner_id, alice.id);
        assert_eq!(
            stocked.metadata.get(TRANSFER_NOTES_KEY),
            Some(&json!("from the market"))
        );

        let mut uow = store.begin().await.unwrap();
        let milk = uow.find_product(milk.id).await.unwrap().unwrap();
        assert_eq!(milk.pantry_id, Some(pantry.id));
    }

    #[tokio::test]
    async fn test_no_purchased_items_is_an_empty_transfer() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 1, false).await;

        let outcome = TransferService::new(&store)
            .transfer(alice.id, list.id, input(pantry.id))
            .await
            .unwrap();
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_requires_list_owner_and_pantry_access() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let alices_pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let bobs_pantry = testing::pantry(&store, &bob, "Garage").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::share_list(&store, &list, &bob).await;
        let transfers = TransferService::new(&store);

        // Shared users cannot transfer someone else's list.
        let err = transfers
            .transfer(bob.id, list.id, input(bobs_pantry.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = transfers
            .transfer(alice.id, list.id, input(bobs_pantry.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        testing::share_pantry(&store, &bobs_pantry, &alice).await;
        transfers
            .transfer(alice.id, list.id, input(bobs_pantry.id))
            .await
            .unwrap();
        transfers
            .transfer(alice.id, list.id, input(alices_pantry.id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_merge_overwrites_unit_and_merges_metadata() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        let mut item = testing::item(&store, &list, &milk, 1, true).await;

        let mut uow = store.begin().await.unwrap();
        uow.insert_pantry_item(NewPantryItem {
            pantry_id: pantry.id,
            product_id: milk.id,
            quantity: testing::qty(1),
            unit: Some("l".to_owned()),
            expiration_date: None,
            owner_id: alice.id,
            added_at: Utc::now(),
            metadata: larder_core::Metadata::from_value(json!({"brand": "A", "shelf": 2}))
                .unwrap(),
        })
        .await
        .unwrap();
        item.unit = Some("ml".to_owned());
        item.metadata = larder_core::Metadata::from_value(json!({"brand": "B"})).unwrap();
        uow.save_list_item(&item).await.unwrap();
        uow.commit().await.unwrap();

        let outcome = TransferService::new(&store)
            .transfer(alice.id, list.id, input(pantry.id))
            .await
            .unwrap();

        let stocked = &outcome.items[0];
        assert_eq!(stocked.unit.as_deref(), Some("ml"));
        assert_eq!(
            stocked.metadata.to_value(),
            json!({"brand": "B", "shelf": 2})
        );
    }

    #[tokio::test]
    async fn test_overflowing_merge_is_rejected_and_rolled_back() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        let mut item = testing::item(&store, &list, &milk, 1, true).await;

        let mut uow = store.begin().await.unwrap();
        item.quantity = larder_core::Quantity::new(rust_decimal::Decimal::MAX).unwrap();
        uow.save_list_item(&item).await.unwrap();
        uow.commit().await.unwrap();
        let transfers = TransferService::new(&store);

        transfers
            .transfer(alice.id, list.id, input(pantry.id))
            .await
            .unwrap();
        let err = transfers
            .transfer(alice.id, list.id, input(pantry.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let mut uow = store.begin().await.unwrap();
        let stocked = uow.pantry_items(pantry.id).await.unwrap();
        assert_eq!(stocked.len(), 1);
        assert_eq!(stocked[0].quantity.as_decimal(), rust_decimal::Decimal::MAX);
    }
}
