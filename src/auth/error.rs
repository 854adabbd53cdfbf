use thiserror::Error;

use crate::error::ExtkitError;

/// Failures of the OAuth credential lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth client not configured: {0}")]
    NotConfigured(String),
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Token exchange failed with status {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String },
    #[error("Token refresh failed with status {status}")]
    RefreshFailed { status: u16 },
    #[error("Invalid state parameter - possible CSRF attack")]
    InvalidState,
    #[error("Redirect initiated; complete the login on the callback")]
    RedirectPending,
    #[error("Access denied")]
    AccessDenied,
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),
    #[error("Authorization cancelled")]
    Cancelled,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for ExtkitError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotConfigured(msg) => ExtkitError::Configuration(msg),
            AuthError::Network(msg) => ExtkitError::Network(msg),
            other => ExtkitError::Authentication(other.to_string()),
        }
    }
}
