//! Persisted OAuth credential record.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair with the absolute expiry of the access token.
///
/// Serialized with camelCase keys and `expiresAt` as epoch milliseconds so a
/// record written by one host can be read by another.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use extkit::auth::Credential;
///
/// let credential = Credential {
///     access_token: "access".to_string(),
///     refresh_token: "refresh".to_string(),
///     expires_at: Utc::now() + Duration::hours(1),
/// };
/// assert!(!credential.is_expired_at(Utc::now()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential whose access token lives `expires_in_secs` from `now`.
    ///
    /// The expiry is truncated to whole milliseconds, the persisted precision,
    /// so a cached credential equals its reloaded copy.
    pub fn issued_at(
        now: DateTime<Utc>,
        access_token: String,
        refresh_token: String,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: (now + Duration::seconds(expires_in_secs)).trunc_subsecs(3),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
