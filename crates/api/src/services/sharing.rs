//! Sharing lists and pantries with other users.
//!
//! Only the owner shares or revokes. A batch of emails is all-or-nothing:
//! if any address has no live account, nothing is shared. Recipients who
//! already have access are skipped, and only newly added recipients get a
//! notification email.

use serde::Deserialize;
use tracing::instrument;

use larder_core::{Email, ListId, PantryId, UserId};

use super::access::{owned_list, owned_pantry};
use super::email::{Mailer, Notification, notify};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{Pantry, ShoppingList, User};

/// Body of `POST /lists/{id}/share` and `POST /pantries/{id}/share`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareInput {
    pub emails: Vec<String>,
}

/// Share and revoke operations.
pub struct SharingService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
}

impl<'a> SharingService<'a> {
    /// Create a new sharing service.
    #[must_use]
    pub const fn new(store: &'a dyn Store, mailer: &'a dyn Mailer) -> Self {
        Self { store, mailer }
    }

    /// Share a list with every user in the batch.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for an empty batch, a malformed email or the
    /// caller's own email, and `NotFound` for a list the caller does not own
    /// or an email without a live account.
    #[instrument(skip(self, input), fields(user_id = %user_id, list_id = %id))]
    pub async fn share_list(
        &self,
        user_id: UserId,
        id: ListId,
        input: ShareInput,
    ) -> Result<ShoppingList> {
        let emails = parse_emails(&input.emails)?;

        let mut uow = self.store.begin().await?;
        let list = owned_list(uow.as_mut(), id, user_id).await?;
        let recipients = recipients(uow.as_mut(), user_id, &emails, &list.shared_with).await?;
        for recipient in &recipients {
            uow.add_list_share(list.id, recipient.id).await?;
        }
        let sharer = sharer_name(uow.as_mut(), user_id).await?;
        let list = uow
            .find_list(list.id, false)
            .await?
            .ok_or_else(|| AppError::not_found("list"))?;
        uow.commit().await?;

        tracing::info!(added = recipients.len(), "List shared");

        for recipient in &recipients {
            notify(
                self.mailer,
                &recipient.email,
                Notification::ListShared {
                    list_name: list.name.clone(),
                    shared_by: sharer.clone(),
                },
            )
            .await;
        }

        Ok(list)
    }

    /// Share a pantry with every user in the batch.
    ///
    /// # Errors
    ///
    /// Same as [`Self::share_list`].
    #[instrument(skip(self, input), fields(user_id = %user_id, pantry_id = %id))]
    pub async fn share_pantry(
        &self,
        user_id: UserId,
        id: PantryId,
        input: ShareInput,
    ) -> Result<Pantry> {
        let emails = parse_emails(&input.emails)?;

        let mut uow = self.store.begin().await?;
        let pantry = owned_pantry(uow.as_mut(), id, user_id).await?;
        let recipients = recipients(uow.as_mut(), user_id, &emails, &pantry.shared_with).await?;
        for recipient in &recipients {
            uow.add_pantry_share(pantry.id, recipient.id).await?;
        }
        let sharer = sharer_name(uow.as_mut(), user_id).await?;
        let pantry = uow
            .find_pantry(pantry.id)
            .await?
            .ok_or_else(|| AppError::not_found("pantry"))?;
        uow.commit().await?;

        tracing::info!(added = recipients.len(), "Pantry shared");

        for recipient in &recipients {
            notify(
                self.mailer,
                &recipient.email,
                Notification::PantryShared {
                    pantry_name: pantry.name.clone(),
                    shared_by: sharer.clone(),
                },
            )
            .await;
        }

        Ok(pantry)
    }

    /// Stop sharing a list with one user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a list the caller does not own and `BadRequest`
    /// if the user was not shared.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %id, target = %target))]
    pub async fn revoke_list(
        &self,
        user_id: UserId,
        id: ListId,
        target: UserId,
    ) -> Result<ShoppingList> {
        let mut uow = self.store.begin().await?;
        let list = owned_list(uow.as_mut(), id, user_id).await?;
        if !uow.remove_list_share(list.id, target).await? {
            return Err(not_shared("list"));
        }
        let list = uow
            .find_list(list.id, false)
            .await?
            .ok_or_else(|| AppError::not_found("list"))?;
        uow.commit().await?;

        tracing::info!("List share revoked");
        Ok(list)
    }

    /// Stop sharing a pantry with one user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a pantry the caller does not own and
    /// `BadRequest` if the user was not shared.
    #[instrument(skip(self), fields(user_id = %user_id, pantry_id = %id, target = %target))]
    pub async fn revoke_pantry(
        &self,
        user_id: UserId,
        id: PantryId,
        target: UserId,
    ) -> Result<Pantry> {
        let mut uow = self.store.begin().await?;
        let pantry = owned_pantry(uow.as_mut(), id, user_id).await?;
        if !uow.remove_pantry_share(pantry.id, target).await? {
            return Err(not_shared("pantry"));
        }
        let pantry = uow
            .find_pantry(pantry.id)
            .await?
            .ok_or_else(|| AppError::not_found("pantry"))?;
        uow.commit().await?;

        tracing::info!("Pantry share revoked");
        Ok(pantry)
    }
}

/// Parse and dedupe a batch of emails, keeping their order.
fn parse_emails(raw: &[String]) -> Result<Vec<Email>> {
    let mut emails: Vec<Email> = Vec::with_capacity(raw.len());
    for value in raw {
        let email = Email::parse(value)?;
        if !emails.contains(&email) {
            emails.push(email);
        }
    }

    if emails.is_empty() {
        return Err(AppError::BadRequest(
            "emails must contain at least one address".to_owned(),
        ));
    }
    Ok(emails)
}

/// Resolve every email to a live user and drop those already shared.
async fn recipients(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    emails: &[Email],
    shared_with: &[UserId],
) -> Result<Vec<User>> {
    let users = uow.find_users_by_emails(emails).await?;

    if let Some(missing) = emails
        .iter()
        .find(|email| !users.iter().any(|user| &user.email == *email))
    {
        return Err(AppError::NotFound(format!("no user with email {missing}")));
    }
    if users.iter().any(|user| user.id == user_id) {
        return Err(AppError::BadRequest(
            "cannot share with yourself".to_owned(),
        ));
    }

    Ok(users
        .into_iter()
        .filter(|user| !shared_with.contains(&user.id))
        .collect())
}

async fn sharer_name(uow: &mut dyn UnitOfWork, user_id: UserId) -> Result<String> {
    uow.find_user(user_id)
        .await?
        .map(|user| user.display_name)
        .ok_or_else(|| AppError::not_found("user"))
}

fn not_shared(resource: &str) -> AppError {
    AppError::BadRequest(format!("user is not shared on this {resource}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::email::RecordingMailer;
    use crate::services::testing;

    fn emails(addresses: &[&str]) -> ShareInput {
        ShareInput {
            emails: addresses.iter().map(|&a| a.to_owned()).collect(),
        }
    }

    #[tokio::test]
    async fn test_share_list_notifies_new_recipients_once() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let list = testing::list(&store, &alice, "Weekly", false).await;
        let sharing = SharingService::new(&store, &mailer);

        let shared = sharing
            .share_list(
                alice.id,
                list.id,
                emails(&["bob@example.com", " BOB@example.com "]),
            )
            .await
            .unwrap();
        assert_eq!(shared.shared_with, vec![bob.id]);

        // Sharing again is a no-op: no duplicate, no second email.
        let shared = sharing
            .share_list(alice.id, list.id, emails(&["bob@example.com"]))
            .await
            .unwrap();
        assert_eq!(shared.shared_with, vec![bob.id]);

        let sent = mailer.sent_to(&bob.email);
        assert_eq!(
            sent,
            vec![Notification::ListShared {
                list_name: "Weekly".to_owned(),
                shared_by: "alice".to_owned(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_email_shares_nothing() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let alice = testing::user(&store, "alice@example.com").await;
        testing::user(&store, "bob@example.com").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        let sharing = SharingService::new(&store, &mailer);

        let err = sharing
            .share_pantry(
                alice.id,
                pantry.id,
                emails(&["bob@example.com", "nobody@example.com"]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let mut uow = store.begin().await.unwrap();
        let pantry = uow.find_pantry(pantry.id).await.unwrap().unwrap();
        assert!(pantry.shared_with.is_empty());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_share_rejects_self_empty_and_non_owner() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let list = testing::list(&store, &alice, "Weekly", false).await;
        testing::share_list(&store, &list, &bob).await;
        let sharing = SharingService::new(&store, &mailer);

        let err = sharing
            .share_list(alice.id, list.id, emails(&["alice@example.com"]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = sharing
            .share_list(alice.id, list.id, emails(&[]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = sharing
            .share_list(alice.id, list.id, emails(&["not an email"]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        // Shared users cannot share further.
        let err = sharing
            .share_list(bob.id, list.id, emails(&["alice@example.com"]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_notification_still_shares() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::failing();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;

        let shared = SharingService::new(&store, &mailer)
            .share_pantry(alice.id, pantry.id, emails(&["bob@example.com"]))
            .await
            .unwrap();
        assert_eq!(shared.shared_with, vec![bob.id]);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_revoke() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let alice = testing::user(&store, "alice@example.com").await;
        let bob = testing::user(&store, "bob@example.com").await;
        let list = testing::list(&store, &alice, "Weekly", false).await;
        let pantry = testing::pantry(&store, &alice, "Kitchen").await;
        testing::share_list(&store, &list, &bob).await;
        testing::share_pantry(&store, &pantry, &bob).await;
        let sharing = SharingService::new(&store, &mailer);

        let err = sharing
            .revoke_list(bob.id, list.id, bob.id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let list = sharing.revoke_list(alice.id, list.id, bob.id).await.unwrap();
        assert!(list.shared_with.is_empty());
        let err = sharing
            .revoke_list(alice.id, list.id, bob.id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let pantry = sharing
            .revoke_pantry(alice.id, pantry.id, bob.id)
            .await
            .unwrap();
        assert!(pantry.shared_with.is_empty());
    }
}
