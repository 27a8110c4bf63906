//! Credential and token lifecycle for Mailgate
//!
//! Provides the pieces every provider client authenticates through:
//! 1. `SecretStore` - the credential bundle, cached for a fixed TTL
//! 2. `TokenManager` - an OAuth2 access token, refreshed on expiry
//! 3. `ApiKeyAuthorizer` - allow/deny decisions for inbound API keys

mod authorizer;
mod clock;
mod error;
mod oauth;
pub mod secrets;
mod token;

pub use authorizer::{ApiKeyAuthorizer, AuthPolicy, Effect, PolicyDocument, PolicyStatement};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, AuthResult};
pub use oauth::{OAuth2Config, OAuth2TokenEndpoint, RefreshGrant, TokenEndpoint, TokenGrant};
pub use secrets::{
    backend_for, CredentialBundle, EnvSecretBackend, FileSecretBackend, SecretBackend, SecretStore,
};
pub use token::{AccessToken, TokenManager};
