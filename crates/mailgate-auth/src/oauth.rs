//! OAuth2 refresh-token grant
//!
//! The mailbox provider issues a long-lived refresh token once; every access
//! token after that comes from exchanging it at the token endpoint.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse,
    TokenUrl,
};
use std::time::Duration;
use tracing::debug;

/// OAuth2 provider configuration
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Authorization endpoint URL (unused by the refresh grant, required by the client)
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Upper bound on a single token request
    pub timeout: Duration,
}

impl OAuth2Config {
    /// Zoho accounts server
    pub fn zoho() -> Self {
        Self {
            auth_url: "https://accounts.zoho.com/oauth/v2/auth".to_string(),
            token_url: "https://accounts.zoho.com/oauth/v2/token".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// The client credentials and refresh token presented to the token endpoint
#[derive(Clone)]
pub struct RefreshGrant {
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// What the token endpoint handed back
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Server-reported lifetime, relative to the moment of the request
    pub expires_in: Option<Duration>,
}

/// Something that can exchange a refresh token for an access token
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(&self, grant: &RefreshGrant) -> AuthResult<TokenGrant>;
}

/// Token endpoint backed by the `oauth2` crate
pub struct OAuth2TokenEndpoint {
    config: OAuth2Config,
    auth_url: AuthUrl,
    token_url: TokenUrl,
}

impl OAuth2TokenEndpoint {
    pub fn new(config: OAuth2Config) -> AuthResult<Self> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid token URL: {}", e)))?;

        Ok(Self {
            config,
            auth_url,
            token_url,
        })
    }
}

#[async_trait]
impl TokenEndpoint for OAuth2TokenEndpoint {
    async fn refresh(&self, grant: &RefreshGrant) -> AuthResult<TokenGrant> {
        // Client credentials travel as request parameters, not Basic auth
        let client = BasicClient::new(
            ClientId::new(grant.client_id.clone()),
            Some(ClientSecret::new(grant.client_secret.clone())),
            self.auth_url.clone(),
            Some(self.token_url.clone()),
        )
        .set_auth_type(AuthType::RequestBody);

        debug!("Requesting access token from {}", self.config.token_url);

        let refresh_token = RefreshToken::new(grant.refresh_token.clone());
        let request = client
            .exchange_refresh_token(&refresh_token)
            .request_async(oauth2::reqwest::async_http_client);

        let token_response = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| {
                AuthError::TokenRefreshFailed(format!(
                    "token endpoint did not answer within {:?}",
                    self.config.timeout
                ))
            })?
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        Ok(TokenGrant {
            access_token: token_response.access_token().secret().clone(),
            expires_in: token_response.expires_in(),
        })
    }
}
