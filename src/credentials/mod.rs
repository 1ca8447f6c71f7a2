//! Upstream credential acquisition, caching and refresh.
//!
//! One process-wide [`CredentialManager`] owns the cached bearer token for
//! the Agent Engine. All upstream calls go through [`CredentialManager::acquire`];
//! configuration updates must call [`CredentialManager::invalidate`].

pub mod ambient;
pub mod service_account;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use crate::config::AgentEngineConfig;
use crate::error::GatewayError;

/// Tokens are reused only while `now < expires_at - margin`. Upstream access
/// tokens live 60 minutes, so a cached entry is effectively good for 50.
const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(10 * 60);

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Workload identity federation. Declared in config but not implemented;
    /// acquisition falls through to the next source instead of minting one.
    WorkloadIdentity,
    ServiceAccount,
    AmbientDefault,
}

/// An acquired upstream bearer token.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: Instant,
    pub source: CredentialSource,
}

impl Credential {
    #[must_use]
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_SAFETY_MARGIN < self.expires_at
    }
}

/// Seam between the cache policy and the actual token acquisition round-trip.
pub trait TokenSource: Send + Sync {
    /// Perform one acquisition round-trip, yielding a valid credential.
    fn fetch<'a>(
        &'a self,
        config: &'a AgentEngineConfig,
    ) -> BoxFuture<'a, Result<Credential, GatewayError>>;
}

/// Process-wide credential cache.
///
/// The mutex is held across the fetch so that concurrent callers on a cache
/// miss trigger at most one network round-trip; callers arriving later find
/// the freshly populated entry under the same lock.
pub struct CredentialManager {
    cache: Mutex<Option<Arc<Credential>>>,
    source: Box<dyn TokenSource>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_source(Box::new(HttpTokenSource { http }))
    }

    #[must_use]
    pub fn with_source(source: Box<dyn TokenSource>) -> Self {
        Self {
            cache: Mutex::new(None),
            source,
        }
    }

    /// Return the cached credential while valid, otherwise acquire a fresh one.
    ///
    /// Acquisition failure is fatal to the enclosing request and is never
    /// retried here.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Auth`] when no credential source can produce a
    /// token.
    pub async fn acquire(
        &self,
        config: &AgentEngineConfig,
    ) -> Result<Arc<Credential>, GatewayError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Instant::now()) {
                return Ok(Arc::clone(cached));
            }
        }

        let credential = Arc::new(self.source.fetch(config).await?);
        tracing::info!(source = ?credential.source, "acquired Agent Engine credential");
        *cache = Some(Arc::clone(&credential));
        Ok(credential)
    }

    /// Drop the cached credential. Must be called on any configuration update.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

// ---------------------------------------------------------------------------
// HttpTokenSource — the real acquisition chain
// ---------------------------------------------------------------------------

/// Token source backed by the Google OAuth endpoints.
///
/// Selection order:
/// 1. Workload identity federation when both identifiers are configured —
///    declared but unimplemented, logs and falls through.
/// 2. Inline service-account key JSON.
/// 3. Ambient default credentials (key file from the environment, then the
///    metadata server).
struct HttpTokenSource {
    http: reqwest::Client,
}

impl TokenSource for HttpTokenSource {
    fn fetch<'a>(
        &'a self,
        config: &'a AgentEngineConfig,
    ) -> BoxFuture<'a, Result<Credential, GatewayError>> {
        Box::pin(async move {
            if config.workload_identity_provider.is_some()
                && config.workload_identity_service_account.is_some()
            {
                tracing::warn!(
                    "workload identity federation is configured but not implemented; \
                     falling back to the next credential source"
                );
            }

            if let Some(sa_json) = config.service_account_json.as_deref() {
                tracing::info!("using service-account key for Agent Engine authentication");
                let key = service_account::ServiceAccountKey::parse(sa_json)?;
                return service_account::exchange(&self.http, &key, CredentialSource::ServiceAccount)
                    .await;
            }

            tracing::info!("using ambient default credentials for Agent Engine authentication");
            ambient::acquire_default(&self.http).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        calls: AtomicUsize,
        lifetimes: Vec<Duration>,
    }

    impl FakeSource {
        fn new(lifetimes: Vec<Duration>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                lifetimes,
            }
        }
    }

    impl TokenSource for FakeSource {
        fn fetch<'a>(
            &'a self,
            _config: &'a AgentEngineConfig,
        ) -> BoxFuture<'a, Result<Credential, GatewayError>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                let lifetime = self
                    .lifetimes
                    .get(call)
                    .copied()
                    .unwrap_or(Duration::from_secs(3600));
                Ok(Credential {
                    token: format!("token-{call}"),
                    expires_at: Instant::now() + lifetime,
                    source: CredentialSource::ServiceAccount,
                })
            })
        }
    }

    fn manager_with(lifetimes: Vec<Duration>) -> (Arc<CredentialManager>, Arc<FakeSource>) {
        // Leak-free sharing of the call counter: the manager owns the box, the
        // test keeps an Arc view of the same allocation.
        struct Shared(Arc<FakeSource>);
        impl TokenSource for Shared {
            fn fetch<'a>(
                &'a self,
                config: &'a AgentEngineConfig,
            ) -> BoxFuture<'a, Result<Credential, GatewayError>> {
                self.0.fetch(config)
            }
        }
        let source = Arc::new(FakeSource::new(lifetimes));
        let manager = Arc::new(CredentialManager::with_source(Box::new(Shared(Arc::clone(
            &source,
        )))));
        (manager, source)
    }

    #[tokio::test]
    async fn second_acquire_within_lifetime_is_cached() {
        let (manager, source) = manager_with(vec![Duration::from_secs(3600)]);
        let config = AgentEngineConfig::default();

        let first = manager.acquire(&config).await.unwrap();
        let second = manager.acquire(&config).await.unwrap();

        assert_eq!(first.token, second.token);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entry_triggers_exactly_one_refresh() {
        // First token is already inside the safety margin, so the next
        // acquire must refresh; the refreshed token is then reused.
        let (manager, source) = manager_with(vec![
            Duration::from_secs(60),
            Duration::from_secs(3600),
        ]);
        let config = AgentEngineConfig::default();

        let first = manager.acquire(&config).await.unwrap();
        let second = manager.acquire(&config).await.unwrap();
        let third = manager.acquire(&config).await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(second.token, third.token);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_miss_performs_single_round_trip() {
        let (manager, source) = manager_with(vec![Duration::from_secs(3600)]);
        let config = AgentEngineConfig::default();

        let a = {
            let manager = Arc::clone(&manager);
            let config = config.clone();
            tokio::spawn(async move { manager.acquire(&config).await.unwrap().token.clone() })
        };
        let b = {
            let manager = Arc::clone(&manager);
            let config = config.clone();
            tokio::spawn(async move { manager.acquire(&config).await.unwrap().token.clone() })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_clears_the_cache() {
        let (manager, source) = manager_with(vec![
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        ]);
        let config = AgentEngineConfig::default();

        let first = manager.acquire(&config).await.unwrap();
        manager.invalidate().await;
        let second = manager.acquire(&config).await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn freshness_respects_safety_margin() {
        let now = Instant::now();
        let fresh = Credential {
            token: "t".into(),
            expires_at: now + Duration::from_secs(11 * 60),
            source: CredentialSource::AmbientDefault,
        };
        let stale = Credential {
            token: "t".into(),
            expires_at: now + Duration::from_secs(9 * 60),
            source: CredentialSource::AmbientDefault,
        };
        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
    }
}
