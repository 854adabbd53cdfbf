//! OAuth credential lifecycle for one scope.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Deserialize;

use super::authorizer::{
    parse_redirect_url, AuthorizationOutcome, AuthorizationRequest, InteractiveAuthorizer,
};
use super::credential::Credential;
use super::error::AuthError;
use super::state::{self, PendingState};
use super::store::{KeyValueStore, StoreKeys};
use crate::config::{OAuthConfig, RefreshFallback};

/// Owns the persisted [`Credential`] for one scope and keeps it usable:
/// interactive login, code exchange, transparent refresh and revocation.
///
/// Construct one per scope at startup and share it (e.g. behind an `Arc`)
/// with everything that needs a token. All token operations on one manager
/// are serialized, so concurrent callers never trigger duplicate refreshes or
/// logins.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use extkit::auth::{CredentialManager, FileStore, LoopbackAuthorizer};
/// use extkit::config::OAuthConfig;
///
/// # async fn example() -> Result<(), extkit::auth::AuthError> {
/// let manager = CredentialManager::new(
///     OAuthConfig::from_env(),
///     Arc::new(FileStore::new_default()),
///     Arc::new(LoopbackAuthorizer::new()),
/// );
/// let token = manager.get_access_token().await?;
/// # let _ = token;
/// # Ok(())
/// # }
/// ```
pub struct CredentialManager {
    config: OAuthConfig,
    keys: StoreKeys,
    store: Arc<dyn KeyValueStore>,
    authorizer: Arc<dyn InteractiveAuthorizer>,
    client: reqwest::Client,
    cached: Mutex<Option<Credential>>,
    op_lock: tokio::sync::Mutex<()>,
}

impl CredentialManager {
    pub fn new(
        config: OAuthConfig,
        store: Arc<dyn KeyValueStore>,
        authorizer: Arc<dyn InteractiveAuthorizer>,
    ) -> Self {
        if !config.is_complete() {
            tracing::warn!(
                scope = %config.scope,
                "OAuth client credentials not configured; set GOOGLE_OAUTH_CLIENT_ID and GOOGLE_OAUTH_CLIENT_SECRET"
            );
        }
        let keys = StoreKeys::for_scope(&config.scope);
        Self {
            config,
            keys,
            store,
            authorizer,
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn scope(&self) -> &str {
        &self.config.scope
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// True when a credential exists in memory or persistence. No network.
    pub async fn is_logged_in(&self) -> Result<bool, AuthError> {
        Ok(self.load()?.is_some())
    }

    /// Snapshot of the current credential, if any. No network.
    pub async fn credential(&self) -> Result<Option<Credential>, AuthError> {
        self.load()
    }

    /// Return a usable access token, refreshing an expired one first.
    ///
    /// A still-valid token is returned without any network call. When the
    /// provider rejects the refresh token the stored credential is cleared
    /// and, depending on [`RefreshFallback`], an interactive login is run or
    /// [`AuthError::RefreshFailed`] is returned.
    pub async fn get_access_token(&self) -> Result<String, AuthError> {
        let _guard = self.op_lock.lock().await;

        let credential = self.load()?.ok_or(AuthError::NotLoggedIn)?;
        if !credential.is_expired() {
            return Ok(credential.access_token);
        }

        match self.refresh(&credential).await {
            Ok(refreshed) => Ok(refreshed.access_token),
            Err(err @ AuthError::RefreshFailed { .. }) => match self.config.refresh_fallback {
                RefreshFallback::InteractiveLogin => {
                    tracing::info!(scope = %self.config.scope, "Token refresh failed, reinitializing auth");
                    self.interactive_login().await
                }
                RefreshFallback::Fail => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Run the full interactive authorization flow unconditionally.
    pub async fn login(&self) -> Result<String, AuthError> {
        let _guard = self.op_lock.lock().await;
        self.interactive_login().await
    }

    /// Complete a redirect-style login from the host's callback page.
    ///
    /// `state` must match the nonce issued by the pending login; otherwise
    /// [`AuthError::InvalidState`] is returned and no exchange is attempted.
    pub async fn handle_auth_callback(&self, code: &str, state: &str) -> Result<String, AuthError> {
        let _guard = self.op_lock.lock().await;
        state::consume(self.store.as_ref(), &self.keys.state, state)?;
        let credential = self.exchange_code(code).await?;
        Ok(credential.access_token)
    }

    /// Best-effort revoke at the provider, then clear the local credential.
    ///
    /// Only a failure to clear local persistence is returned; the provider
    /// call is bounded by `OAuthConfig::request_timeout`, and a failure or
    /// timeout is logged and ignored.
    pub async fn revoke_token(&self) -> Result<(), AuthError> {
        let _guard = self.op_lock.lock().await;
        let Some(credential) = self.load()? else {
            return Ok(());
        };

        let result = self
            .client
            .get(&self.config.endpoints.revoke_url)
            .timeout(self.config.request_timeout)
            .query(&[("token", credential.access_token.as_str())])
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(scope = %self.config.scope, "Token revoked at provider");
            }
            Ok(resp) => {
                tracing::error!(status = %resp.status(), "Error revoking token");
            }
            Err(err) => {
                tracing::error!(error = %err, "Error revoking token");
            }
        }

        self.clear()
    }

    async fn interactive_login(&self) -> Result<String, AuthError> {
        let (client_id, _) = self.config.require_credentials()?;
        let (pending, nonce) = PendingState::issue(
            self.store.as_ref(),
            &self.keys.state,
            self.config.state_ttl,
        )?;
        let request = AuthorizationRequest::new(&self.config, client_id, &nonce)?;

        // `pending` drops the nonce on every early return, and when this
        // future is dropped mid-authorization.
        match self.authorizer.authorize(&request).await? {
            AuthorizationOutcome::Redirected => {
                pending.keep();
                Err(AuthError::RedirectPending)
            }
            AuthorizationOutcome::RedirectUrl(url) => {
                let params = parse_redirect_url(&url)?;
                pending.consume(params.state.as_deref().unwrap_or_default())?;
                let credential = self.exchange_code(&params.code).await?;
                Ok(credential.access_token)
            }
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential, AuthError> {
        let (client_id, client_secret) = self.config.require_credentials()?;

        let resp = self
            .client
            .post(&self.config.endpoints.token_url)
            .timeout(self.config.request_timeout)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, "Authorization code exchange failed");
            return Err(AuthError::TokenExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        let payload = parse_token_response(&resp.text().await?)?;
        let refresh_token = match payload.refresh_token {
            Some(token) => token,
            None => self
                .load()?
                .map(|previous| previous.refresh_token)
                .ok_or_else(|| {
                    AuthError::InvalidResponse(
                        "token response did not include a refresh_token".to_string(),
                    )
                })?,
        };
        let credential = Credential::issued_at(
            Utc::now(),
            payload.access_token,
            refresh_token,
            payload.expires_in,
        );
        self.save(&credential)?;
        tracing::info!(scope = %self.config.scope, "Signed in");
        Ok(credential)
    }

    async fn refresh(&self, current: &Credential) -> Result<Credential, AuthError> {
        let (client_id, client_secret) = self.config.require_credentials()?;
        tracing::debug!(scope = %self.config.scope, "Refreshing access token");

        let resp = self
            .client
            .post(&self.config.endpoints.token_url)
            .timeout(self.config.request_timeout)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", current.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::error!(%status, "Refresh token failed");
            self.clear()?;
            return Err(AuthError::RefreshFailed {
                status: status.as_u16(),
            });
        }

        let payload = parse_token_response(&resp.text().await?)?;
        let refreshed = Credential::issued_at(
            Utc::now(),
            payload.access_token,
            payload
                .refresh_token
                .unwrap_or_else(|| current.refresh_token.clone()),
            payload.expires_in,
        );
        self.save(&refreshed)?;
        Ok(refreshed)
    }

    fn load(&self) -> Result<Option<Credential>, AuthError> {
        if let Some(credential) = self.cache()?.as_ref() {
            return Ok(Some(credential.clone()));
        }

        let Some(raw) = self.store.get(&self.keys.credential)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Credential>(&raw) {
            Ok(credential) => {
                *self.cache()? = Some(credential.clone());
                Ok(Some(credential))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable stored credential");
                self.store.remove(&self.keys.credential)?;
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let serialized = serde_json::to_string(credential)?;
        self.store.set(&self.keys.credential, &serialized)?;
        *self.cache()? = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.cache()? = None;
        self.store.remove(&self.keys.credential)
    }

    fn cache(&self) -> Result<std::sync::MutexGuard<'_, Option<Credential>>, AuthError> {
        self.cached
            .lock()
            .map_err(|_| AuthError::Io("credential cache lock poisoned".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: Option<String>,
}

fn parse_token_response(body: &str) -> Result<TokenResponse, AuthError> {
    serde_json::from_str(body)
        .map_err(|err| AuthError::InvalidResponse(format!("malformed token response: {err}")))
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}
