//! Revoked token ids.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

/// Remembers token ids that were logged out.
///
/// Entries only need to outlive the tokens they refer to, so implementations
/// may forget them once the token lifetime has passed.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark a token id as revoked.
    async fn revoke(&self, token_id: &str);

    /// Whether a token id has been revoked.
    async fn is_revoked(&self, token_id: &str) -> bool;
}

/// In-process revocation list whose entries expire with the token lifetime.
#[derive(Clone)]
pub struct MokaRevocationStore {
    cache: Cache<String, ()>,
}

impl MokaRevocationStore {
    /// Create a store that forgets entries after `token_ttl`.
    #[must_use]
    pub fn new(token_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(token_ttl)
            .build();

        Self { cache }
    }
}

#[async_trait]
impl RevocationStore for MokaRevocationStore {
    async fn revoke(&self, token_id: &str) {
        self.cache.insert(token_id.to_owned(), ()).await;
    }

    async fn is_revoked(&self, token_id: &str) -> bool {
        self.cache.contains_key(token_id)
    }
}
