use mailgate_auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZohoError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Zoho API error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type ZohoResult<T> = Result<T, ZohoError>;
