//! Owner-or-shared access checks for lists and pantries.
//!
//! A caller who may not see a resource gets the same `NotFound` as for a
//! resource that does not exist.

use larder_core::{ListId, PantryId, ProductId, UserId};

use crate::db::UnitOfWork;
use crate::error::{AppError, Result};
use crate::models::{Pantry, Product, ShoppingList};

/// A resource with an owner and a set of users it is shared with.
pub trait Shared {
    fn owner_id(&self) -> UserId;
    fn shared_with(&self) -> &[UserId];

    fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id() == user_id
    }

    /// Owner, or one of the users it is shared with.
    fn can_access(&self, user_id: UserId) -> bool {
        self.is_owner(user_id) || self.shared_with().contains(&user_id)
    }
}

impl Shared for ShoppingList {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }

    fn shared_with(&self) -> &[UserId] {
        &self.shared_with
    }
}

impl Shared for Pantry {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }

    fn shared_with(&self) -> &[UserId] {
        &self.shared_with
    }
}

/// Live list the caller can access.
pub(crate) async fn accessible_list(
    uow: &mut dyn UnitOfWork,
    id: ListId,
    user_id: UserId,
) -> Result<ShoppingList> {
    uow.find_list(id, false)
        .await?
        .filter(|list| list.can_access(user_id))
        .ok_or_else(|| AppError::not_found("list"))
}

/// Live list owned by the caller.
pub(crate) async fn owned_list(
    uow: &mut dyn UnitOfWork,
    id: ListId,
    user_id: UserId,
) -> Result<ShoppingList> {
    uow.find_list(id, false)
        .await?
        .filter(|list| list.is_owner(user_id))
        .ok_or_else(|| AppError::not_found("list"))
}

/// Live pantry the caller can access.
pub(crate) async fn accessible_pantry(
    uow: &mut dyn UnitOfWork,
    id: PantryId,
    user_id: UserId,
) -> Result<Pantry> {
    uow.find_pantry(id)
        .await?
        .filter(|pantry| pantry.can_access(user_id))
        .ok_or_else(|| AppError::not_found("pantry"))
}

/// Live pantry the caller owns.
///
/// Shared users get `Forbidden`; strangers get `NotFound`.
pub(crate) async fn managed_pantry(
    uow: &mut dyn UnitOfWork,
    id: PantryId,
    user_id: UserId,
) -> Result<Pantry> {
    let pantry = accessible_pantry(uow, id, user_id).await?;
    if !pantry.is_owner(user_id) {
        return Err(AppError::Forbidden(
            "only the owner can change this pantry".to_owned(),
        ));
    }
    Ok(pantry)
}

/// Live pantry owned by the caller, `NotFound` for everyone else.
pub(crate) async fn owned_pantry(
    uow: &mut dyn UnitOfWork,
    id: PantryId,
    user_id: UserId,
) -> Result<Pantry> {
    uow.find_pantry(id)
        .await?
        .filter(|pantry| pantry.is_owner(user_id))
        .ok_or_else(|| AppError::not_found("pantry"))
}

/// Live product that may be put on a list or in a pantry owned by `owner_id`.
///
/// The product must belong to the caller or to the container's owner.
pub(crate) async fn usable_product(
    uow: &mut dyn UnitOfWork,
    id: ProductId,
    user_id: UserId,
    owner_id: UserId,
) -> Result<Product> {
    uow.find_product(id)
        .await?
        .filter(|product| product.owner_id == user_id || product.owner_id == owner_id)
        .ok_or_else(|| AppError::not_found("product"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use larder_core::Metadata;

    use super::*;

    fn pantry(owner: i32, shared: &[i32]) -> Pantry {
        Pantry {
            id: PantryId::new(1),
            name: "Kitchen".to_owned(),
            description: None,
            owner_id: UserId::new(owner),
            shared_with: shared.iter().copied().map(UserId::new).collect(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_owner_and_shared_users_have_access() {
        let pantry = pantry(1, &[2, 3]);
        assert!(pantry.can_access(UserId::new(1)));
        assert!(pantry.can_access(UserId::new(3)));
        assert!(!pantry.can_access(UserId::new(4)));
    }

    #[test]
    fn test_only_owner_is_owner() {
        let pantry = pantry(1, &[2]);
        assert!(pantry.is_owner(UserId::new(1)));
        assert!(!pantry.is_owner(UserId::new(2)));
    }
}
