//! Error types for sending operations

use mailgate_auth::AuthError;
use thiserror::Error;

/// Result type for sending operations
pub type SesResult<T> = Result<T, SesError>;

/// Errors that can occur while handing a message to the sender
#[derive(Debug, Error)]
pub enum SesError {
    /// Connection to the SMTP endpoint failed
    #[error("Failed to connect to SES SMTP endpoint: {0}")]
    ConnectionFailed(String),

    /// The endpoint rejected the message (recipients, quota, auth)
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// Invalid email address
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message building error
    #[error("Failed to build message: {0}")]
    MessageBuildError(String),

    /// Sender credentials could not be loaded
    #[error(transparent)]
    Credentials(#[from] AuthError),
}
