//! Business logic.
//!
//! # Services
//!
//! - `users` - Registration, verification, login/logout, password reset, profile
//! - `catalog` - Categories and products
//! - `lists` / `list_items` - Shopping lists and their items
//! - `pantries` / `pantry_items` - Pantries and their stock
//! - `purchases` - Purchase, history and restore
//! - `transfer` - Moving purchased list items into a pantry
//! - `sharing` - Sharing lists and pantries with other users
//! - `auth` - Password hashing, one-time codes, bearer tokens
//! - `email` - Mail delivery
//!
//! Every service borrows the shared [`Store`](crate::db::Store). Writes open
//! one unit of work per call and commit it last; returning early with `?`
//! drops the unit of work, which rolls it back. Input is validated before the
//! unit of work opens.

pub mod access;
pub mod auth;
pub mod catalog;
pub mod email;
pub mod list_items;
pub mod lists;
pub mod pantries;
pub mod pantry_items;
pub mod purchases;
pub mod sharing;
pub mod transfer;
pub mod users;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use larder_core::Metadata;

use crate::error::{AppError, Result};

/// Deserialize a field that distinguishes "absent" from `null`.
///
/// Use with `#[serde(default, deserialize_with = "present")]`: a missing field
/// stays `None`, an explicit `null` becomes `Some(None)` for `Option<Option<T>>`
/// and `Some(Value::Null)` for `Option<Value>`.
pub fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Trim a required name. `BadRequest` when blank.
pub(crate) fn required_name(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_owned())
}

/// Trim optional free text; blank becomes `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Validate a unit given in a request: trimmed and non-empty when present.
pub(crate) fn unit(value: Option<String>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(unit) => required_name("unit", &unit).map(Some),
    }
}

/// Metadata from a request body. Absent and `null` both give `{}`.
pub(crate) fn metadata(value: Option<Value>) -> Result<Metadata> {
    Ok(Metadata::from_value(value.unwrap_or(Value::Null))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! Fixtures shared by the service tests.

    use larder_core::{Email, Metadata, Quantity};
    use rust_decimal::Decimal;

    use crate::db::{MemoryStore, Store};
    use crate::models::{
        NewList, NewListItem, NewPantry, NewProduct, NewUser, Pantry, Product, ShoppingList, User,
    };

    /// A verified user with the given email.
    pub async fn user(store: &MemoryStore, email: &str) -> User {
        let mut uow = store.begin().await.unwrap();
        let user = uow
            .insert_user(NewUser {
                email: Email::parse(email).unwrap(),
                password_hash: crate::services::auth::hash_password("correct horse").unwrap(),
                display_name: email.split('@').next().unwrap().to_owned(),
                email_verified: true,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        user
    }

    pub async fn product(store: &MemoryStore, owner: &User, name: &str) -> Product {
        let mut uow = store.begin().await.unwrap();
        let product = uow
            .insert_product(NewProduct {
                name: name.to_owned(),
                description: None,
                unit: Some("pcs".to_owned()),
                default_quantity: Quantity::ONE,
                category_id: None,
                owner_id: owner.id,
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        product
    }

    pub async fn list(store: &MemoryStore, owner: &User, name: &str, recurring: bool) -> ShoppingList {
        let mut uow = store.begin().await.unwrap();
        let list = uow
            .insert_list(NewList {
                name: name.to_owned(),
                description: None,
                recurring,
                owner_id: owner.id,
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        list
    }

    pub async fn pantry(store: &MemoryStore, owner: &User, name: &str) -> Pantry {
        let mut uow = store.begin().await.unwrap();
        let pantry = uow
            .insert_pantry(NewPantry {
                name: name.to_owned(),
                description: None,
                owner_id: owner.id,
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        pantry
    }

    /// Put `product` on `list` with the given quantity, optionally already purchased.
    pub async fn item(
        store: &MemoryStore,
        list: &ShoppingList,
        product: &Product,
        quantity: i64,
        purchased: bool,
    ) -> crate::models::ListItem {
        let mut uow = store.begin().await.unwrap();
        let mut item = uow
            .insert_list_item(NewListItem {
                list_id: list.id,
                product_id: product.id,
                quantity: qty(quantity),
                unit: None,
                owner_id: list.owner_id,
                metadata: Metadata::new(),
            })
            .await
            .unwrap();
        if purchased {
            item.purchased = true;
            item.last_purchased_at = Some(chrono::Utc::now());
            item = uow.save_list_item(&item).await.unwrap();
        }
        uow.commit().await.unwrap();
        item
    }

    pub fn qty(value: i64) -> Quantity {
        Quantity::new(Decimal::from(value)).unwrap()
    }

    /// Share `list` with `user` directly through the store.
    pub async fn share_list(store: &MemoryStore, list: &ShoppingList, user: &User) {
        let mut uow = store.begin().await.unwrap();
        uow.add_list_share(list.id, user.id).await.unwrap();
        uow.commit().await.unwrap();
    }

    pub async fn share_pantry(store: &MemoryStore, pantry: &Pantry, user: &User) {
        let mut uow = store.begin().await.unwrap();
        uow.add_pantry_share(pantry.id, user.id).await.unwrap();
        uow.commit().await.unwrap();
    }
}
