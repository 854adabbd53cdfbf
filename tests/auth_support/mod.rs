#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, SubsecRound, Utc};
use extkit::auth::{
    AuthError, AuthorizationOutcome, AuthorizationRequest, Credential, CredentialManager,
    InteractiveAuthorizer, KeyValueStore, MemoryStore, StoreKeys,
};
use extkit::config::{OAuthConfig, ProviderEndpoints, RefreshFallback};
use reqwest::Url;
use serde_json::{json, Value};

pub const SCOPE: &str = "email";
pub const REDIRECT_URI: &str = "http://localhost:3000/auth/callback";

/// What the scripted authorizer does on its next call.
#[derive(Debug)]
pub enum Step {
    /// Report a full-page redirect.
    Redirect,
    /// Return a redirect URL carrying `code` and the request's own state.
    Consent { code: String },
    /// Return a redirect URL carrying `code` and an arbitrary state.
    ConsentWithState { code: String, state: String },
    /// Return an arbitrary redirect URL.
    Url(String),
    Fail(AuthError),
    /// Never answer, like a user who walks away from the consent page.
    Hang,
}

/// Authorizer that replays scripted steps and records every request.
#[derive(Default)]
pub struct ScriptedAuthorizer {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<AuthorizationRequest>>,
}

impl ScriptedAuthorizer {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn none() -> Arc<Self> {
        Self::new([])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock poisoned").len()
    }

    pub fn last_request(&self) -> Option<AuthorizationRequest> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl InteractiveAuthorizer for ScriptedAuthorizer {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, AuthError> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request.clone());
        let step = self
            .steps
            .lock()
            .expect("steps lock poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected interactive login"));
        match step {
            Step::Redirect => Ok(AuthorizationOutcome::Redirected),
            Step::Consent { code } => Ok(AuthorizationOutcome::RedirectUrl(redirect_url(
                &request.redirect_uri,
                &code,
                &request.state,
            ))),
            Step::ConsentWithState { code, state } => Ok(AuthorizationOutcome::RedirectUrl(
                redirect_url(&request.redirect_uri, &code, &state),
            )),
            Step::Url(url) => Ok(AuthorizationOutcome::RedirectUrl(url)),
            Step::Fail(err) => Err(err),
            Step::Hang => std::future::pending().await,
        }
    }
}

pub fn consent(code: &str) -> Step {
    Step::Consent {
        code: code.to_string(),
    }
}

pub fn redirect_url(redirect_uri: &str, code: &str, state: &str) -> String {
    Url::parse_with_params(redirect_uri, &[("code", code), ("state", state)])
        .expect("redirect uri")
        .into()
}

/// Query parameter `name` of `url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn test_config(server_uri: &str) -> OAuthConfig {
    OAuthConfig::new()
        .with_client_id("test-client")
        .with_client_secret("test-secret")
        .with_redirect_uri(REDIRECT_URI)
        .with_scope(SCOPE)
        .with_endpoints(ProviderEndpoints::from_base_url(server_uri))
}

pub fn manager(
    config: OAuthConfig,
    store: Arc<MemoryStore>,
    authorizer: Arc<ScriptedAuthorizer>,
) -> CredentialManager {
    CredentialManager::new(config, store, authorizer)
}

pub fn manager_with_fallback(
    server_uri: &str,
    fallback: RefreshFallback,
    store: Arc<MemoryStore>,
    authorizer: Arc<ScriptedAuthorizer>,
) -> CredentialManager {
    manager(
        test_config(server_uri).with_refresh_fallback(fallback),
        store,
        authorizer,
    )
}

pub fn valid_credential(access: &str, refresh: &str) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: (Utc::now() + Duration::hours(1)).trunc_subsecs(3),
    }
}

pub fn expired_credential(access: &str, refresh: &str) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: (Utc::now() - Duration::seconds(1)).trunc_subsecs(3),
    }
}

pub fn seed(store: &dyn KeyValueStore, credential: &Credential) {
    let raw = serde_json::to_string(credential).expect("serialize credential");
    store
        .set(&StoreKeys::for_scope(SCOPE).credential, &raw)
        .expect("seed credential");
}

pub fn stored(store: &dyn KeyValueStore) -> Option<Credential> {
    store
        .get(&StoreKeys::for_scope(SCOPE).credential)
        .expect("read credential")
        .map(|raw| serde_json::from_str(&raw).expect("parse credential"))
}

pub fn pending_state(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(&StoreKeys::for_scope(SCOPE).state)
        .expect("read state")
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> Value {
    let mut body = json!({
        "access_token": access,
        "expires_in": expires_in,
        "token_type": "Bearer",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}
