//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::db::Store;
use crate::services::auth::{MokaRevocationStore, RevocationStore, TokenService};
use crate::services::catalog::CatalogService;
use crate::services::email::Mailer;
use crate::services::list_items::ListItemService;
use crate::services::lists::ListService;
use crate::services::pantries::PantryService;
use crate::services::pantry_items::PantryItemService;
use crate::services::purchases::PurchaseService;
use crate::services::sharing::SharingService;
use crate::services::transfer::TransferService;
use crate::services::users::UserService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the services,
/// each borrowing the shared collaborators.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenService,
    revocations: Arc<dyn RevocationStore>,
    verification_ttl: Duration,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Logged-out tokens are remembered for `token_ttl`, the lifetime of the
    /// tokens themselves.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        token_secret: SecretString,
        token_ttl: Duration,
        verification_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                mailer,
                tokens: TokenService::new(token_secret, token_ttl),
                revocations: Arc::new(MokaRevocationStore::new(token_ttl)),
                verification_ttl,
            }),
        }
    }

    /// The persistence backend.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Bearer token issuer and verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Logged-out token ids.
    #[must_use]
    pub fn revocations(&self) -> &dyn RevocationStore {
        self.inner.revocations.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> UserService<'_> {
        UserService::new(
            self.store(),
            self.inner.mailer.as_ref(),
            &self.inner.tokens,
            self.revocations(),
            self.inner.verification_ttl,
        )
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.store())
    }

    #[must_use]
    pub fn lists(&self) -> ListService<'_> {
        ListService::new(self.store())
    }

    #[must_use]
    pub fn list_items(&self) -> ListItemService<'_> {
        ListItemService::new(self.store())
    }

    #[must_use]
    pub fn pantries(&self) -> PantryService<'_> {
        PantryService::new(self.store())
    }

    #[must_use]
    pub fn pantry_items(&self) -> PantryItemService<'_> {
        PantryItemService::new(self.store())
    }

    #[must_use]
    pub fn purchases(&self) -> PurchaseService<'_> {
        PurchaseService::new(self.store())
    }

    #[must_use]
    pub fn transfers(&self) -> TransferService<'_> {
        TransferService::new(self.store())
    }

    #[must_use]
    pub fn sharing(&self) -> SharingService<'_> {
        SharingService::new(self.store(), self.inner.mailer.as_ref())
    }
}
