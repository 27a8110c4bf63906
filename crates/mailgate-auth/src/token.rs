//! Access token cache with transparent refresh

use crate::secrets::keys;
use crate::{AuthError, AuthResult, Clock, RefreshGrant, SecretStore, TokenEndpoint};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// An access token and the absolute instant it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Usable only while the expiry is strictly in the future
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Owns one refresh-token flow and at most one live access token
pub struct TokenManager {
    secrets: Arc<SecretStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(
        secrets: Arc<SecretStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            secrets,
            endpoint,
            clock,
            current: Mutex::new(None),
        }
    }

    /// The currently cached token, if any (valid or not)
    pub async fn cached(&self) -> Option<AccessToken> {
        self.current.lock().await.clone()
    }

    /// Get a usable access token, refreshing it when absent or expired.
    ///
    /// Refreshes are serialized: callers arriving while a refresh is in
    /// flight wait for it and then reuse its result.
    pub async fn access_token(&self) -> AuthResult<String> {
        let mut current = self.current.lock().await;
        let now = self.clock.now();

        if let Some(token) = current.as_ref() {
            if token.is_valid_at(now) {
                return Ok(token.value.clone());
            }
            debug!("Access token expired at {}", token.expires_at);
        }

        // Whatever was cached is unusable from here on
        *current = None;

        let bundle = self.secrets.get_secrets().await?;
        let grant = RefreshGrant {
            refresh_token: bundle.require(keys::ZOHO_REFRESH_TOKEN)?.to_string(),
            client_id: bundle.require(keys::ZOHO_CLIENT_ID)?.to_string(),
            client_secret: bundle.require(keys::ZOHO_CLIENT_SECRET)?.to_string(),
        };

        let response = self.endpoint.refresh(&grant).await.map_err(|e| {
            error!("Error refreshing access token: {}", e);
            e
        })?;

        if response.access_token.is_empty() {
            return Err(AuthError::TokenRefreshFailed(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        let lifetime = response
            .expires_in
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .filter(|d| *d > chrono::Duration::zero());

        match lifetime {
            Some(lifetime) => {
                let token = AccessToken {
                    value: response.access_token,
                    expires_at: now + lifetime,
                };
                info!("Refreshed access token, valid until {}", token.expires_at);
                let value = token.value.clone();
                *current = Some(token);
                Ok(value)
            }
            None => {
                warn!("Token endpoint reported no lifetime, not caching the access token");
                Ok(response.access_token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, SecretBackend, TokenGrant};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticBackend;

    #[async_trait]
    impl SecretBackend for StaticBackend {
        async fn fetch(&self, _secret_id: &str) -> AuthResult<String> {
            Ok(r#"{
                "zohoRefreshToken": "1000.refresh",
                "zohoClientId": "client-id",
                "zohoClientSecret": "client-secret",
                "zohoAccountId": "42"
            }"#
            .to_string())
        }
    }

    struct FakeEndpoint {
        calls: AtomicUsize,
        expires_in: Option<std::time::Duration>,
        fail: bool,
    }

    impl FakeEndpoint {
        fn new(expires_in: Option<u64>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                expires_in: expires_in.map(std::time::Duration::from_secs),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Some(3600))
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenEndpoint for FakeEndpoint {
        async fn refresh(&self, grant: &RefreshGrant) -> AuthResult<TokenGrant> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(grant.refresh_token, "1000.refresh");
            assert_eq!(grant.client_id, "client-id");
            if self.fail {
                return Err(AuthError::TokenRefreshFailed("invalid_code".to_string()));
            }
            Ok(TokenGrant {
                access_token: format!("token-{}", n),
                expires_in: self.expires_in,
            })
        }
    }

    fn manager(endpoint: Arc<FakeEndpoint>, clock: Arc<ManualClock>) -> TokenManager {
        let secrets = Arc::new(SecretStore::new(Arc::new(StaticBackend), "test", clock.clone()));
        TokenManager::new(secrets, endpoint, clock)
    }

    #[tokio::test]
    async fn test_valid_token_is_reused_without_refresh() {
        let endpoint = Arc::new(FakeEndpoint::new(Some(3600)));
        let clock = Arc::new(ManualClock::default());
        let manager = manager(endpoint.clone(), clock.clone());

        assert_eq!(manager.access_token().await.unwrap(), "token-1");
        clock.advance(Duration::minutes(59));
        assert_eq!(manager.access_token().await.unwrap(), "token-1");

        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_sets_absolute_expiry() {
        let endpoint = Arc::new(FakeEndpoint::new(Some(3600)));
        let clock = Arc::new(ManualClock::default());
        let start = clock.now();
        let manager = manager(endpoint.clone(), clock.clone());

        manager.access_token().await.unwrap();

        let cached = manager.cached().await.unwrap();
        assert_eq!(cached.expires_at, start + Duration::seconds(3600));
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_triggers_one_refresh() {
        let endpoint = Arc::new(FakeEndpoint::new(Some(3600)));
        let clock = Arc::new(ManualClock::default());
        let manager = manager(endpoint.clone(), clock.clone());

        manager.access_token().await.unwrap();
        clock.advance(Duration::seconds(3600));

        assert_eq!(manager.access_token().await.unwrap(), "token-2");
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_or_zero_lifetime_is_not_cached() {
        for expires_in in [None, Some(0)] {
            let endpoint = Arc::new(FakeEndpoint::new(expires_in));
            let clock = Arc::new(ManualClock::default());
            let manager = manager(endpoint.clone(), clock);

            assert_eq!(manager.access_token().await.unwrap(), "token-1");
            assert!(manager.cached().await.is_none());
            assert_eq!(manager.access_token().await.unwrap(), "token-2");
            assert_eq!(endpoint.calls(), 2);
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_propagates() {
        let endpoint = Arc::new(FakeEndpoint::failing());
        let clock = Arc::new(ManualClock::default());
        let manager = manager(endpoint.clone(), clock);

        let result = manager.access_token().await;
        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
        assert!(manager.cached().await.is_none());
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let endpoint = Arc::new(FakeEndpoint::new(Some(3600)));
        let clock = Arc::new(ManualClock::default());
        let manager = Arc::new(manager(endpoint.clone(), clock));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.access_token().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }

        assert_eq!(endpoint.calls(), 1);
    }
}
