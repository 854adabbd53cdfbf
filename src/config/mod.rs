//! OAuth client configuration (layered: code > env > defaults).

use std::fmt;

use chrono::Duration;

use crate::auth::error::AuthError;
use crate::auth::state::DEFAULT_STATE_TTL_SECS;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/auth/callback";
pub const DEFAULT_SCOPE: &str = "email";
/// Upper bound for any single call to the token or revocation endpoint.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REVOKE_URL: &str = "https://accounts.google.com/o/oauth2/revoke";

const ENV_CLIENT_ID: &str = "GOOGLE_OAUTH_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "GOOGLE_OAUTH_CLIENT_SECRET";
const ENV_REDIRECT_URI: &str = "GOOGLE_OAUTH_REDIRECT_URI";
const ENV_SCOPE: &str = "GOOGLE_OAUTH_SCOPE";

/// Identity provider endpoints. Defaults point at Google.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub revoke_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            revoke_url: DEFAULT_REVOKE_URL.to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Point every endpoint at `base` (`{base}/auth`, `{base}/token`,
    /// `{base}/revoke`), e.g. a local mock server.
    pub fn from_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/auth"),
            token_url: format!("{base}/token"),
            revoke_url: format!("{base}/revoke"),
        }
    }
}

/// What `get_access_token` does when the provider rejects the refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshFallback {
    /// Run the interactive login and return its token.
    #[default]
    InteractiveLogin,
    /// Surface `AuthError::RefreshFailed` to the caller.
    Fail,
}

/// OAuth client settings for one credential scope.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub endpoints: ProviderEndpoints,
    pub state_ttl: Duration,
    pub refresh_fallback: RefreshFallback,
    pub request_timeout: std::time::Duration,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| ".."))
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("endpoints", &self.endpoints)
            .field("state_ttl", &self.state_ttl)
            .field("refresh_fallback", &self.refresh_fallback)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthConfig {
    /// Unconfigured client with default redirect, scope and Google endpoints.
    pub fn new() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            endpoints: ProviderEndpoints::default(),
            state_ttl: Duration::seconds(DEFAULT_STATE_TTL_SECS),
            refresh_fallback: RefreshFallback::default(),
            request_timeout: std::time::Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load from environment variables (`GOOGLE_OAUTH_CLIENT_ID`, ...).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::new();
        config.client_id = read(ENV_CLIENT_ID);
        config.client_secret = read(ENV_CLIENT_SECRET);
        if let Some(uri) = read(ENV_REDIRECT_URI) {
            config.redirect_uri = uri;
        }
        if let Some(scope) = read(ENV_SCOPE) {
            config.scope = scope;
        }
        config
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    pub fn with_refresh_fallback(mut self, fallback: RefreshFallback) -> Self {
        self.refresh_fallback = fallback;
        self
    }

    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// True when both client id and secret are present.
    pub fn is_complete(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    pub(crate) fn require_client_id(&self) -> Result<&str, AuthError> {
        self.client_id.as_deref().ok_or_else(|| {
            AuthError::NotConfigured(format!("{ENV_CLIENT_ID} is not set"))
        })
    }

    pub(crate) fn require_credentials(&self) -> Result<(&str, &str), AuthError> {
        let client_id = self.require_client_id()?;
        let secret = self.client_secret.as_deref().ok_or_else(|| {
            AuthError::NotConfigured(format!("{ENV_CLIENT_SECRET} is not set"))
        })?;
        Ok((client_id, secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = OAuthConfig::from_lookup(|_| None);
        assert_eq!(config.client_id, None);
        assert_eq!(config.client_secret, None);
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.scope, "email");
        assert_eq!(config.endpoints, ProviderEndpoints::default());
        assert_eq!(config.refresh_fallback, RefreshFallback::InteractiveLogin);
        assert_eq!(config.request_timeout, std::time::Duration::from_secs(30));
        assert!(!config.is_complete());
    }

    #[test]
    fn env_values_override_defaults() {
        let config = OAuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_OAUTH_CLIENT_ID", "cid"),
            ("GOOGLE_OAUTH_CLIENT_SECRET", "secret"),
            ("GOOGLE_OAUTH_REDIRECT_URI", "http://127.0.0.1:8765/cb"),
            ("GOOGLE_OAUTH_SCOPE", "https://www.googleapis.com/auth/documents"),
        ]));
        assert_eq!(config.client_id.as_deref(), Some("cid"));
        assert_eq!(config.client_secret.as_deref(), Some("secret"));
        assert_eq!(config.redirect_uri, "http://127.0.0.1:8765/cb");
        assert_eq!(config.scope, "https://www.googleapis.com/auth/documents");
        assert!(config.is_complete());
    }

    #[test]
    fn blank_env_values_count_as_unset() {
        let config = OAuthConfig::from_lookup(lookup_from(&[
            ("GOOGLE_OAUTH_CLIENT_ID", "  "),
            ("GOOGLE_OAUTH_SCOPE", ""),
        ]));
        assert_eq!(config.client_id, None);
        assert_eq!(config.scope, "email");
    }

    #[test]
    fn require_credentials_names_the_missing_variable() {
        let config = OAuthConfig::new().with_client_id("cid");
        match config.require_credentials() {
            Err(AuthError::NotConfigured(msg)) => assert!(msg.contains(ENV_CLIENT_SECRET)),
            other => panic!("expected NotConfigured, got {other:?}"),
        }
        assert_eq!(config.require_client_id().unwrap(), "cid");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = OAuthConfig::new().with_client_secret("super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn endpoints_from_base_url_trim_trailing_slash() {
        let endpoints = ProviderEndpoints::from_base_url("http://127.0.0.1:9000/");
        assert_eq!(endpoints.token_url, "http://127.0.0.1:9000/token");
        assert_eq!(endpoints.revoke_url, "http://127.0.0.1:9000/revoke");
        assert_eq!(endpoints.authorize_url, "http://127.0.0.1:9000/auth");
    }
}
