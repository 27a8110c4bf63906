//! Error types for the auth module

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while obtaining credentials or tokens
#[derive(Debug, Error)]
pub enum AuthError {
    /// The secrets backend could not be read or returned unusable data
    #[error("Failed to retrieve secrets: {0}")]
    SecretFetchFailed(String),

    /// A required key is absent from the credential bundle
    #[error("Secret not found in credential bundle: {0}")]
    MissingSecret(String),

    /// The token endpoint rejected the refresh grant or was unreachable
    #[error("Failed to refresh access token: {0}")]
    TokenRefreshFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AuthError {
    /// Whether this error originated in the secrets backend rather than the token endpoint
    pub fn is_secret_error(&self) -> bool {
        matches!(
            self,
            AuthError::SecretFetchFailed(_) | AuthError::MissingSecret(_) | AuthError::IoError(_)
        )
    }
}
