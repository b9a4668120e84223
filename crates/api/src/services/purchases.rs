//! Purchasing lists, purchase history and restoring archived lists.
//!
//! # Purchase
//!
//! Only items already marked purchased are snapshotted into the purchase.
//! A recurring list is reset in place afterwards; any other list is archived
//! (soft-deleted) and stays reachable through the purchase.
//!
//! # Restore
//!
//! Restoring a purchase of an archived list creates a fresh, unpurchased copy
//! of the snapshot under a new name and re-points the purchase at it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use larder_core::{ListId, Page, PurchaseId, UserId};

use super::access::accessible_list;
use super::metadata;
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::query::PageParams;
use crate::models::{ListDetail, NewList, NewListItem, NewPurchase, NewPurchaseItem, Purchase};

/// Body of `POST /lists/{id}/purchase`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseInput {
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Result of purchasing or restoring: the list as it is now and the purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOutcome {
    pub list: ListDetail,
    pub purchase: Purchase,
}

/// Purchase operations.
pub struct PurchaseService<'a> {
    store: &'a dyn Store,
}

impl<'a> PurchaseService<'a> {
    /// Create a new purchase service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Check out a list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an inaccessible list, `ListEmpty` for a list
    /// without items and `NothingPurchased` when no item is marked purchased.
    #[instrument(skip(self, input), fields(user_id = %user_id, list_id = %list_id))]
    pub async fn purchase(
        &self,
        user_id: UserId,
        list_id: ListId,
        input: PurchaseInput,
    ) -> Result<PurchaseOutcome> {
        let metadata = metadata(input.metadata)?;

        let mut uow = self.store.begin().await?;
        let mut list = accessible_list(uow.as_mut(), list_id, user_id).await?;

        let items = uow.list_items(list.id).await?;
        if items.is_empty() {
            return Err(AppError::ListEmpty);
        }

        let now = Utc::now();
        let mut bought = Vec::new();
        for mut item in items.into_iter().filter(|item| item.purchased) {
            item.last_purchased_at = Some(now);
            bought.push(uow.save_list_item(&item).await?);
        }
        if bought.is_empty() {
            return Err(AppError::NothingPurchased);
        }

        let purchase = uow
            .insert_purchase(NewPurchase {
                list_id: list.id,
                owner_id: user_id,
                metadata,
                items: bought.iter().map(NewPurchaseItem::from).collect(),
            })
            .await?;

        if list.recurring {
            for mut item in bought {
                item.purchased = false;
                uow.save_list_item(&item).await?;
            }
        } else {
            list.deleted_at = Some(now);
        }
        list.last_purchased_at = Some(now);
        let list = uow.save_list(&list).await?;
        let items = uow.list_items(list.id).await?;

        uow.commit().await?;

        tracing::info!(
            purchase_id = %purchase.id,
            items = purchase.items.len(),
            archived = list.deleted_at.is_some(),
            "List purchased"
        );

        Ok(PurchaseOutcome {
            list: ListDetail { list, items },
            purchase,
        })
    }

    /// The caller's purchases, newest first by default.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for invalid paging.
    pub async fn page(&self, user_id: UserId, params: &PageParams) -> Result<Page<Purchase>> {
        let listing = params.listing(user_id)?;
        Ok(self.store.page_purchases(&listing).await?)
    }

    /// One of the caller's purchases with its snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if missing or owned by someone else.
    pub async fn get(&self, user_id: UserId, id: PurchaseId) -> Result<Purchase> {
        let mut uow = self.store.begin().await?;
        let purchase = owned_purchase(uow.as_mut(), id, user_id).await?;
        uow.commit().await?;
        Ok(purchase)
    }

    /// Recreate the purchased list from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the purchase or its list is missing and
    /// `BadRequest` if the list is recurring.
    #[instrument(skip(self), fields(user_id = %user_id, purchase_id = %id))]
    pub async fn restore(&self, user_id: UserId, id: PurchaseId) -> Result<PurchaseOutcome> {
        let mut uow = self.store.begin().await?;
        let mut purchase = owned_purchase(uow.as_mut(), id, user_id).await?;

        let original = uow
            .find_list(purchase.list_id, true)
            .await?
            .ok_or_else(|| AppError::not_found("list"))?;
        if original.recurring {
            return Err(AppError::BadRequest(
                "purchases of recurring lists cannot be restored".to_owned(),
            ));
        }

        let taken = uow.list_names(user_id).await?;
        let list = uow
            .insert_list(NewList {
                name: restored_name(&original.name, &taken),
                description: original.description.clone(),
                recurring: false,
                owner_id: user_id,
                metadata: original.metadata.clone(),
            })
            .await?;

        for item in &purchase.items {
            uow.insert_list_item(NewListItem {
                list_id: list.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit: item.unit.clone(),
                owner_id: user_id,
                metadata: item.metadata.clone(),
            })
            .await?;
        }

        purchase.list_id = list.id;
        purchase.restored_at = Some(Utc::now());
        let purchase = uow.save_purchase(&purchase).await?;
        let items = uow.list_items(list.id).await?;

        uow.commit().await?;

        tracing::info!(
            from_list_id = %original.id,
            list_id = %list.id,
            "Purchase restored"
        );

        Ok(PurchaseOutcome {
            list: ListDetail { list, items },
            purchase,
        })
    }
}

async fn owned_purchase(
    uow: &mut dyn UnitOfWork,
    id: PurchaseId,
    user_id: UserId,
) -> Result<Purchase> {
    uow.find_purchase(id)
        .await?
        .filter(|purchase| purchase.owner_id == user_id)
        .ok_or_else(|| AppError::not_found("purchase"))
}

const RESTORED: &str = " (restored";

/// Name for a restored list that none of `taken` uses.
///
/// `"Groceries"` becomes `"Groceries (restored)"`, then `"Groceries (restored 2)"`
/// and so on. A name that already carries the suffix is numbered from its base.
fn restored_name(name: &str, taken: &[String]) -> String {
    let base = strip_restored(name);
    let is_free = |candidate: &str| !taken.iter().any(|t| t == candidate);

    let first = format!("{base}{RESTORED})");
    if is_free(&first) {
        return first;
    }

    (2_u32..)
        .map(|n| format!("{base}{RESTORED} {n})"))
        .find(|candidate| is_free(candidate))
        .unwrap_or(first)
}

fn strip_restored(name: &str) -> &str {
    let Some(rest) = name.strip_suffix(')') else {
        return name;
    };
    let Some(pos) = rest.rfind(RESTORED) else {
        return name;
    };
    let (base, suffix) = rest.split_at(pos);
    let counter = suffix.trim_start_matches(RESTORED).trim();
    if counter.is_empty() || counter.chars().all(|c| c.is_ascii_digit()) {
        base
    } else {
        name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::list_items::{ListItemPatch, ListItemService};
    use crate::services::testing;

    #[test]
    fn test_restored_name_counts_up() {
        let taken = vec!["Groceries".to_owned()];
        assert_eq!(restored_name("Groceries", &taken), "Groceries (restored)");

        let taken = vec![
            "Groceries (restored)".to_owned(),
            "Groceries (restored 2)".to_owned(),
        ];
        assert_eq!(restored_name("Groceries", &taken), "Groceries (restored 3)");
    }

    #[test]
    fn test_restored_name_strips_existing_suffix() {
        let taken = vec!["Groceries (restored)".to_owned()];
        assert_eq!(
            restored_name("Groceries (restored)", &taken),
            "Groceries (restored 2)"
        );
        assert_eq!(strip_restored("Party (restored 12)"), "Party");
        assert_eq!(strip_restored("Party (restored soon)"), "Party (restored soon)");
        assert_eq!(strip_restored("Party (big)"), "Party (big)");
    }

    #[tokio::test]
    async fn test_empty_list_purchase_fails_with_list_empty() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;

        let err = PurchaseService::new(&store)
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ListEmpty));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "list has no items");
    }

    #[tokio::test]
    async fn test_unmarked_items_fail_with_nothing_purchased() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 1, false).await;

        let err = PurchaseService::new(&store)
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NothingPurchased));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "list has no purchased items");
    }

    #[tokio::test]
    async fn test_failed_purchase_changes_nothing() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 1, false).await;

        let purchases = PurchaseService::new(&store);
        purchases
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap_err();

        let page = purchases
            .page(alice.id, &PageParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let mut uow = store.begin().await.unwrap();
        let list = uow.find_list(list.id, false).await.unwrap().unwrap();
        assert!(list.last_purchased_at.is_none());
    }

    #[tokio::test]
    async fn test_groceries_purchase_archives_list() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let bread = testing::product(&store, &alice, "Bread").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        let item_a = testing::item(&store, &list, &milk, 1, true).await;
        testing::item(&store, &list, &bread, 1, false).await;

        let outcome = PurchaseService::new(&store)
            .purchase(
                alice.id,
                list.id,
                PurchaseInput {
                    metadata: Some(json!({"store": "corner shop"})),
                },
            )
            .await
            .unwrap();

        assert!(outcome.list.list.last_purchased_at.is_some());
        assert!(outcome.list.list.deleted_at.is_some());
        assert_eq!(outcome.purchase.items.len(), 1);
        assert_eq!(outcome.purchase.items[0].list_item_id, item_a.id);
        assert_eq!(outcome.purchase.owner_id, alice.id);
        assert_eq!(
            outcome.purchase.metadata.get("store"),
            Some(&json!("corner shop"))
        );

        let mut uow = store.begin().await.unwrap();
        assert!(uow.find_list(list.id, false).await.unwrap().is_none());
        assert!(uow.find_list(list.id, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recurring_purchase_resets_items_in_place() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Weekly", true).await;
        testing::item(&store, &list, &milk, 2, true).await;

        let outcome = PurchaseService::new(&store)
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap();

        assert!(outcome.list.list.deleted_at.is_none());
        assert_eq!(outcome.list.items.len(), 1);
        assert!(!outcome.list.items[0].purchased);
        assert!(outcome.list.items[0].last_purchased_at.is_some());
        assert_eq!(outcome.purchase.items.len(), 1);
        assert_eq!(outcome.purchase.items[0].quantity, testing::qty(2));
    }

    #[tokio::test]
    async fn test_snapshot_survives_later_item_changes() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Weekly", true).await;
        let item = testing::item(&store, &list, &milk, 2, true).await;
        let purchases = PurchaseService::new(&store);

        let outcome = purchases
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap();

        ListItemService::new(&store)
            .patch(
                alice.id,
                list.id,
                item.id,
                ListItemPatch {
                    quantity: Some(testing::qty(9)),
                    ..ListItemPatch::default()
                },
            )
            .await
            .unwrap();

        let purchase = purchases.get(alice.id, outcome.purchase.id).await.unwrap();
        assert_eq!(purchase.items[0].quantity, testing::qty(2));
    }

    #[tokio::test]
    async fn test_restore_recreates_unpurchased_list() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 3, true).await;
        let purchases = PurchaseService::new(&store);

        let bought = purchases
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap();
        let restored = purchases.restore(alice.id, bought.purchase.id).await.unwrap();

        assert_eq!(restored.list.list.name, "Groceries (restored)");
        assert!(!restored.list.list.recurring);
        assert!(restored.list.list.deleted_at.is_none());
        assert_eq!(restored.list.items.len(), 1);
        assert!(restored.list.items.iter().all(|item| !item.purchased));
        assert!(
            restored
                .list
                .items
                .iter()
                .all(|item| item.last_purchased_at.is_none())
        );
        assert_eq!(restored.list.items[0].quantity, testing::qty(3));

        assert_eq!(restored.purchase.list_id, restored.list.list.id);
        assert!(restored.purchase.restored_at.is_some());
    }

    #[tokio::test]
    async fn test_second_restore_follows_forward_pointer() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 1, true).await;
        let purchases = PurchaseService::new(&store);

        let bought = purchases
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap();
        let first = purchases.restore(alice.id, bought.purchase.id).await.unwrap();
        let second = purchases.restore(alice.id, bought.purchase.id).await.unwrap();

        assert_ne!(first.list.list.id, second.list.list.id);
        assert_eq!(second.list.list.name, "Groceries (restored 2)");
        assert_eq!(second.purchase.list_id, second.list.list.id);
    }

    #[tokio::test]
    async fn test_restore_of_recurring_list_is_bad_request() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Weekly", true).await;
        testing::item(&store, &list, &milk, 1, true).await;
        let purchases = PurchaseService::new(&store);

        let bought = purchases
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap();
        let err = purchases
            .restore(alice.id, bought.purchase.id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_purchases_are_private() {
        let store = MemoryStore::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let milk = testing::product(&store, &alice, "Milk").await;
        let list = testing::list(&store, &alice, "Groceries", false).await;
        testing::item(&store, &list, &milk, 1, true).await;
        let purchases = PurchaseService::new(&store);

        let bought = purchases
            .purchase(alice.id, list.id, PurchaseInput::default())
            .await
            .unwrap();

        assert_eq!(
            purchases
                .get(bob.id, bought.purchase.id)
                .await
                .unwrap_err()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            purchases
                .restore(bob.id, bought.purchase.id)
                .await
                .unwrap_err()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
