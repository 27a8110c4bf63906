//! Credential bundle storage with a fixed time-to-live cache
//!
//! The bundle is a flat JSON object of named secrets read from a backend
//! (a file or an environment variable). It is fetched once and served from
//! memory until the TTL runs out, then replaced wholesale.

use crate::{AuthError, AuthResult, Clock};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// How long a fetched bundle is served before the backend is read again
pub const SECRETS_CACHE_TTL_MINUTES: i64 = 15;

/// Well-known keys in the credential bundle
pub mod keys {
    pub const ZOHO_REFRESH_TOKEN: &str = "zohoRefreshToken";
    pub const ZOHO_CLIENT_ID: &str = "zohoClientId";
    pub const ZOHO_CLIENT_SECRET: &str = "zohoClientSecret";
    pub const ZOHO_ACCOUNT_ID: &str = "zohoAccountId";
    pub const EMAIL_FROM: &str = "emailFrom";
    pub const API_KEY: &str = "apiKey";
    pub const SES_SMTP_USERNAME: &str = "sesSmtpUsername";
    pub const SES_SMTP_PASSWORD: &str = "sesSmtpPassword";
}

/// Immutable mapping of named secrets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    values: HashMap<String, String>,
}

impl CredentialBundle {
    /// Parse a bundle from the JSON document stored in the backend
    pub fn from_json(raw: &str) -> AuthResult<Self> {
        let document: serde_json::Map<String, Value> = serde_json::from_str(raw).map_err(|e| {
            AuthError::SecretFetchFailed(format!("Secret payload is not a JSON object: {}", e))
        })?;

        // Scalars are kept as text; a numeric account id is as usable as a quoted one
        let values: HashMap<String, String> = document
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    nested => nested.to_string(),
                };
                Some((key, text))
            })
            .collect();

        if values.is_empty() {
            return Err(AuthError::SecretFetchFailed(
                "Secret payload is empty".to_string(),
            ));
        }

        Ok(Self { values })
    }

    /// Look up an optional secret
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look up a secret that must be present
    pub fn require(&self, key: &str) -> AuthResult<&str> {
        self.get(key)
            .ok_or_else(|| AuthError::MissingSecret(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A place secrets are read from
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Return the raw secret document stored under `secret_id`
    async fn fetch(&self, secret_id: &str) -> AuthResult<String>;
}

/// Reads the secret document from a file; `secret_id` is the path
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSecretBackend;

#[async_trait]
impl SecretBackend for FileSecretBackend {
    async fn fetch(&self, secret_id: &str) -> AuthResult<String> {
        let path = PathBuf::from(secret_id);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            AuthError::SecretFetchFailed(format!("{}: {}", path.display(), e))
        })
    }
}

/// Reads the secret document from an environment variable; `secret_id` is its name
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretBackend;

#[async_trait]
impl SecretBackend for EnvSecretBackend {
    async fn fetch(&self, secret_id: &str) -> AuthResult<String> {
        std::env::var(secret_id)
            .map_err(|e| AuthError::SecretFetchFailed(format!("{}: {}", secret_id, e)))
    }
}

/// Resolve a secrets-backend identifier of the form `file:<path>` or `env:<VAR>`.
///
/// An identifier without a scheme is treated as an environment variable name.
pub fn backend_for(identifier: &str) -> AuthResult<(Arc<dyn SecretBackend>, String)> {
    let (backend, id): (Arc<dyn SecretBackend>, &str) = match identifier.split_once(':') {
        Some(("file", path)) => (Arc::new(FileSecretBackend), path),
        Some(("env", var)) => (Arc::new(EnvSecretBackend), var),
        Some((scheme, _)) => {
            return Err(AuthError::InvalidConfig(format!(
                "Unknown secrets backend scheme: {}",
                scheme
            )))
        }
        None => (Arc::new(EnvSecretBackend), identifier),
    };

    if id.is_empty() {
        return Err(AuthError::InvalidConfig(format!(
            "Empty secret identifier in {:?}",
            identifier
        )));
    }

    Ok((backend, id.to_string()))
}

struct CachedBundle {
    bundle: Arc<CredentialBundle>,
    fetched_at: DateTime<Utc>,
}

/// Process-wide credential cache in front of a [`SecretBackend`]
pub struct SecretStore {
    backend: Arc<dyn SecretBackend>,
    secret_id: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    cache: Mutex<Option<CachedBundle>>,
}

impl SecretStore {
    /// Create a new secret store with the default 15 minute TTL
    pub fn new(backend: Arc<dyn SecretBackend>, secret_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            secret_id: secret_id.into(),
            ttl: Duration::minutes(SECRETS_CACHE_TTL_MINUTES),
            clock,
            cache: Mutex::new(None),
        }
    }

    /// Override the cache TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    /// Get the credential bundle, reading the backend only when the cache is cold or stale.
    ///
    /// The cache lock is held across the fetch, so concurrent callers that find
    /// the cache expired wait for a single backend read. A failed refresh is
    /// returned to the caller; the stale bundle is never served.
    pub async fn get_secrets(&self) -> AuthResult<Arc<CredentialBundle>> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now();

        if let Some(cached) = cache.as_ref() {
            if now - cached.fetched_at < self.ttl {
                return Ok(cached.bundle.clone());
            }
            debug!("Secrets cache for {} expired", self.secret_id);
        }

        let raw = self.backend.fetch(&self.secret_id).await.map_err(|e| {
            error!("Error retrieving secrets from {}: {}", self.secret_id, e);
            e
        })?;
        let bundle = Arc::new(CredentialBundle::from_json(&raw).map_err(|e| {
            error!("Error parsing secrets from {}: {}", self.secret_id, e);
            e
        })?);

        *cache = Some(CachedBundle {
            bundle: bundle.clone(),
            fetched_at: now,
        });

        info!("Loaded {} secrets from {}", bundle.len(), self.secret_id);
        Ok(bundle)
    }
}
