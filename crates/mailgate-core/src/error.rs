//! Error types for the core module

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in gateway operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// The caller sent missing or malformed fields
    #[error("{0}")]
    Validation(String),

    /// Credential bundle could not be loaded
    #[error("{0}")]
    SecretFetch(String),

    /// Access token could not be obtained
    #[error("{0}")]
    TokenRefresh(String),

    /// Mailbox provider answered with an error or could not be reached
    #[error("Mailbox provider error: {message}")]
    MailboxProvider { status: Option<u16>, message: String },

    /// Sender rejected the message
    #[error("Failed to send email: {0}")]
    Send(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl CoreError {
    /// HTTP status reported to the caller for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            _ => 500,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::DatabaseError(e.to_string())
    }
}

impl From<mailgate_auth::AuthError> for CoreError {
    fn from(e: mailgate_auth::AuthError) -> Self {
        if e.is_secret_error() {
            CoreError::SecretFetch(e.to_string())
        } else {
            CoreError::TokenRefresh(e.to_string())
        }
    }
}

impl From<mailgate_zoho::ZohoError> for CoreError {
    fn from(e: mailgate_zoho::ZohoError) -> Self {
        use mailgate_zoho::ZohoError;
        match e {
            ZohoError::Auth(auth) => auth.into(),
            ZohoError::ApiError { status, body } => CoreError::MailboxProvider {
                status: Some(status),
                message: format!("Zoho API error {}: {}", status, body),
            },
            other => CoreError::MailboxProvider {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<mailgate_ses::SesError> for CoreError {
    fn from(e: mailgate_ses::SesError) -> Self {
        use mailgate_ses::SesError;
        match e {
            SesError::Credentials(auth) => auth.into(),
            other => CoreError::Send(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailgate_auth::AuthError;
    use mailgate_zoho::ZohoError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(CoreError::Validation("x".into()).status_code(), 400);
        assert_eq!(CoreError::Send("x".into()).status_code(), 500);
        assert_eq!(CoreError::DatabaseError("x".into()).status_code(), 500);
    }

    #[test]
    fn test_auth_errors_keep_their_category() {
        let e: CoreError = ZohoError::Auth(AuthError::TokenRefreshFailed("bad".into())).into();
        assert!(matches!(e, CoreError::TokenRefresh(_)));

        let e: CoreError = ZohoError::Auth(AuthError::MissingSecret("zohoAccountId".into())).into();
        assert!(matches!(e, CoreError::SecretFetch(_)));

        let e: CoreError = ZohoError::ApiError {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        match e {
            CoreError::MailboxProvider { status, message } => {
                assert_eq!(status, Some(502));
                assert!(message.contains("bad gateway"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
