//! Error types for extkit.

use thiserror::Error;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Unknown,
}

/// Primary error type for extkit operations outside the credential lifecycle.
#[derive(Error, Debug)]
pub enum ExtkitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: {message}")]
    RateLimited {
        /// Server-requested wait from a `Retry-After` header.
        retry_after_ms: Option<u64>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<reqwest::Error> for ExtkitError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout(0);
        }
        Self::Network(error.to_string())
    }
}

impl ExtkitError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Wait the server asked for before the next attempt, if any.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::RateLimited {
                retry_after_ms: Some(ms),
                ..
            } => Some(std::time::Duration::from_millis(*ms)),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ExtkitError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn api_status_maps_to_category() {
        assert_eq!(
            ExtkitError::api(401, "nope").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            ExtkitError::api(429, "slow").category(),
            ErrorCategory::RateLimit
        );
        assert_eq!(
            ExtkitError::api(503, "down").category(),
            ErrorCategory::Server
        );
        assert_eq!(ExtkitError::api(404, "gone").category(), ErrorCategory::Api);
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(ExtkitError::api(500, "boom").is_retryable());
        assert!(ExtkitError::api(429, "slow").is_retryable());
        assert!(ExtkitError::Network("reset".to_string()).is_retryable());
        assert!(ExtkitError::RateLimited {
            retry_after_ms: None,
            message: String::new(),
        }
        .is_retryable());
        assert!(!ExtkitError::api(400, "bad").is_retryable());
        assert!(!ExtkitError::Authentication("no".to_string()).is_retryable());
    }

    #[test]
    fn retry_after_is_only_reported_for_rate_limits() {
        let limited = ExtkitError::RateLimited {
            retry_after_ms: Some(1500),
            message: "quota".to_string(),
        };
        assert_eq!(
            limited.retry_after(),
            Some(std::time::Duration::from_millis(1500))
        );
        assert_eq!(ExtkitError::api(503, "down").retry_after(), None);
    }

    #[test]
    fn auth_errors_convert_by_kind() {
        let err: ExtkitError = AuthError::NotConfigured("client id".to_string()).into();
        assert!(matches!(err, ExtkitError::Configuration(_)));

        let err: ExtkitError = AuthError::NotLoggedIn.into();
        match err {
            ExtkitError::Authentication(msg) => assert_eq!(msg, "Not logged in"),
            other => panic!("expected Authentication, got {other:?}"),
        }
    }
}
