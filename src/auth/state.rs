//! CSRF state nonce round-tripped through the authorization redirect.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::store::KeyValueStore;

/// Default lifetime of a pending login's state nonce.
pub const DEFAULT_STATE_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateRecord {
    value: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expires_at: DateTime<Utc>,
}

/// Generate a fresh nonce and persist it under `key`, replacing any pending one.
pub(crate) fn issue(
    store: &dyn KeyValueStore,
    key: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let value = uuid::Uuid::new_v4().simple().to_string();
    let record = StateRecord {
        value: value.clone(),
        expires_at: Utc::now() + ttl,
    };
    store.set(key, &serde_json::to_string(&record)?)?;
    Ok(value)
}

/// Nonce issued for an in-flight login.
///
/// Dropping it while the login is still unsettled (an error, a cancelled
/// future) removes the nonce, so an abandoned login never leaves one behind.
pub(crate) struct PendingState<'a> {
    store: &'a dyn KeyValueStore,
    key: &'a str,
    armed: bool,
}

impl<'a> PendingState<'a> {
    pub(crate) fn issue(
        store: &'a dyn KeyValueStore,
        key: &'a str,
        ttl: Duration,
    ) -> Result<(Self, String), AuthError> {
        let nonce = issue(store, key, ttl)?;
        let pending = Self {
            store,
            key,
            armed: true,
        };
        Ok((pending, nonce))
    }

    /// Leave the nonce for a callback that arrives later.
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }

    pub(crate) fn consume(mut self, presented: &str) -> Result<(), AuthError> {
        self.armed = false;
        consume(self.store, self.key, presented)
    }
}

impl Drop for PendingState<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.store.remove(self.key) {
            tracing::warn!(error = %err, "Failed to discard pending OAuth state");
        }
    }
}

/// Compare `presented` against the stored nonce.
///
/// The stored nonce is removed before the outcome is decided, so a nonce can
/// be checked at most once.
pub(crate) fn consume(
    store: &dyn KeyValueStore,
    key: &str,
    presented: &str,
) -> Result<(), AuthError> {
    let raw = store.get(key)?;
    store.remove(key)?;

    let Some(raw) = raw else {
        tracing::warn!("OAuth callback arrived with no pending state");
        return Err(AuthError::InvalidState);
    };
    let record: StateRecord = match serde_json::from_str(&raw) {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(error = %err, "Discarding unreadable OAuth state record");
            return Err(AuthError::InvalidState);
        }
    };
    if Utc::now() >= record.expires_at {
        tracing::warn!("OAuth state expired before the callback arrived");
        return Err(AuthError::InvalidState);
    }
    if presented.is_empty() || record.value != presented {
        tracing::warn!("OAuth state mismatch; rejecting callback");
        return Err(AuthError::InvalidState);
    }
    Ok(())
}
