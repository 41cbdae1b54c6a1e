//! Expiry-aware token refresher
//!
//! Owns the single mutable datum of the auth path: the cached token. The
//! connection pool's password source calls [`EntraTokenProvider::password`]
//! whenever a physical connection needs credentials.

use std::sync::{Arc, RwLock};

use chrono::Duration;
use lodestone_core::Result;
use tracing::debug;

use crate::credential::{AccessToken, TokenCredential};
use crate::{ENTRA_DB_SCOPE, TOKEN_REFRESH_MARGIN_SECS};

/// Caches the current token and refreshes it near expiry
///
/// Safe to call from concurrent connection-open attempts: the cache is a
/// single last-writer-wins cell, and every returned token is valid at the
/// moment it is returned.
pub struct EntraTokenProvider {
    credential: Arc<dyn TokenCredential>,
    cached: RwLock<Option<AccessToken>>,
}

impl std::fmt::Debug for EntraTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntraTokenProvider")
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

impl EntraTokenProvider {
    pub fn new(credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            credential,
            cached: RwLock::new(None),
        }
    }

    /// Seed the cache with an already-acquired token
    pub fn prime(&self, token: AccessToken) {
        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token);
    }

    /// Return a currently valid token, refreshing only when the cached one
    /// is within the expiry margin
    ///
    /// Provider failures propagate; there is no retry here.
    pub async fn password(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let token = self.credential.get_token(&[ENTRA_DB_SCOPE]).await?;
        debug!(expires_on = %token.expires_on, "acquired entra token for postgres password");

        let password = token.token.clone();
        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token);

        Ok(password)
    }

    /// Whether the next [`password`](Self::password) call will hit the
    /// identity provider
    pub fn needs_refresh(&self) -> bool {
        self.cached_token().is_none()
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.cached.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|token| !token.expires_within(Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)))
            .map(|token| token.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and issues tokens "t1", "t2", ... with a fixed lifetime
    struct CountingCredential {
        calls: AtomicUsize,
        lifetime: Duration,
    }

    impl CountingCredential {
        fn new(lifetime: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                lifetime,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenCredential for CountingCredential {
        async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(format!("t{n}"), Utc::now() + self.lifetime))
        }
    }

    #[tokio::test]
    async fn test_token_within_margin_is_reused() {
        let credential = Arc::new(CountingCredential::new(Duration::hours(1)));
        let provider = EntraTokenProvider::new(credential.clone());

        let first = provider.password().await.unwrap();
        let second = provider.password().await.unwrap();

        assert_eq!(first, "t1");
        assert_eq!(second, "t1");
        assert_eq!(credential.calls(), 1);
        assert!(!provider.needs_refresh());
    }

    #[tokio::test]
    async fn test_near_expiry_token_triggers_one_refresh() {
        // Lifetime shorter than the refresh margin: every call finds the
        // cached token stale and fetches exactly one new one.
        let credential = Arc::new(CountingCredential::new(Duration::seconds(30)));
        let provider = EntraTokenProvider::new(credential.clone());

        let first = provider.password().await.unwrap();
        assert_eq!(first, "t1");
        assert_eq!(credential.calls(), 1);

        let second = provider.password().await.unwrap();
        assert_eq!(second, "t2");
        assert_eq!(credential.calls(), 2);
    }

    #[tokio::test]
    async fn test_primed_token_avoids_provider_call() {
        let credential = Arc::new(CountingCredential::new(Duration::hours(1)));
        let provider = EntraTokenProvider::new(credential.clone());

        provider.prime(AccessToken::new("primed", Utc::now() + Duration::hours(1)));

        assert_eq!(provider.password().await.unwrap(), "primed");
        assert_eq!(credential.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        struct FailingCredential;

        #[async_trait]
        impl TokenCredential for FailingCredential {
            async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
                Err(lodestone_core::LodestoneError::Token(
                    "identity provider unavailable".to_string(),
                ))
            }
        }

        let provider = EntraTokenProvider::new(Arc::new(FailingCredential));
        let err = provider.password().await.unwrap_err();
        assert!(matches!(err, lodestone_core::LodestoneError::Token(_)));
    }

    #[tokio::test]
    async fn test_concurrent_callers_each_get_valid_tokens() {
        let credential = Arc::new(CountingCredential::new(Duration::hours(1)));
        let provider = Arc::new(EntraTokenProvider::new(credential));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.password().await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
    }
}
