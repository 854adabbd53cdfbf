//! Thin Google Docs and Sheets REST wrappers.
//!
//! Every call obtains its bearer token through
//! [`with_valid_token`](crate::auth::with_valid_token), so an expired
//! credential is refreshed (or a login is run) before the request goes out.
//! Transient failures are retried according to the client's [`RetryPolicy`].

pub mod docs;
pub mod sheets;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;

use crate::auth::{with_valid_token, CredentialManager};
use crate::error::{ExtkitError, Result};
use crate::util::retry::RetryPolicy;

pub use sheets::{column_letter, extract_sheet_id, find_row_index, Color, GridRange};

const DOCS_BASE_URL: &str = "https://docs.googleapis.com";
const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client for the Docs and Sheets APIs.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    manager: Arc<CredentialManager>,
    client: reqwest::Client,
    docs_base_url: String,
    sheets_base_url: String,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl GoogleClient {
    pub fn new(manager: Arc<CredentialManager>) -> Self {
        Self {
            manager,
            client: reqwest::Client::new(),
            docs_base_url: DOCS_BASE_URL.to_string(),
            sheets_base_url: SHEETS_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_docs_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.docs_base_url = base_url.into();
        self
    }

    pub fn with_sheets_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.sheets_base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-attempt deadline covering connect, send and body read.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn manager(&self) -> &CredentialManager {
        &self.manager
    }

    pub(crate) fn docs_url(&self, segments: &[&str]) -> Result<Url> {
        build_url(&self.docs_base_url, segments)
    }

    pub(crate) fn sheets_url(&self, segments: &[&str]) -> Result<Url> {
        build_url(&self.sheets_base_url, segments)
    }

    /// Send a JSON request with a fresh token, retrying transient failures.
    pub(crate) async fn request_json(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value> {
        self.retry
            .execute(|| self.attempt(method.clone(), url.clone(), body))
            .await
    }

    async fn attempt(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value> {
        with_valid_token(&self.manager, |token| async move {
            tracing::debug!(%method, path = url.path(), "Google API request");
            let mut request = self
                .client
                .request(method, url)
                .bearer_auth(token)
                .timeout(self.request_timeout);
            if let Some(body) = body {
                request = request.json(body);
            }
            let resp = request.send().await.map_err(|err| self.transport_error(err))?;

            let status = resp.status();
            if !status.is_success() {
                let retry_after_ms = retry_after_ms(resp.headers());
                let message = resp.text().await.unwrap_or_default();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(ExtkitError::RateLimited {
                        retry_after_ms,
                        message,
                    });
                }
                return Err(ExtkitError::api(status.as_u16(), message));
            }
            resp.json::<Value>()
                .await
                .map_err(|err| self.transport_error(err))
        })
        .await
    }

    fn transport_error(&self, err: reqwest::Error) -> ExtkitError {
        if err.is_timeout() {
            return ExtkitError::Timeout(self.request_timeout.as_millis() as u64);
        }
        err.into()
    }
}

/// `Retry-After` in delta-seconds. HTTP-date values are ignored.
fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(secs.saturating_mul(1000))
}

fn build_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|err| ExtkitError::Configuration(format!("invalid base URL {base}: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| ExtkitError::Configuration(format!("base URL {base} cannot have a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_appends_encoded_segments() {
        let url = build_url("http://127.0.0.1:9000", &["v4", "spreadsheets", "abc", "values", "Sheet 1!A1:B2"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/v4/spreadsheets/abc/values/Sheet%201!A1:B2"
        );
    }

    #[test]
    fn build_url_keeps_base_path() {
        let url = build_url("http://localhost/google/", &["v1", "documents"]).unwrap();
        assert_eq!(url.path(), "/google/v1/documents");
    }

    #[test]
    fn retry_after_reads_delta_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_ms(&headers), None);
        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after_ms(&headers), Some(7000));
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after_ms(&headers), None);
    }

    #[test]
    fn build_url_rejects_garbage_base() {
        assert!(matches!(
            build_url("not a url", &["v1"]),
            Err(ExtkitError::Configuration(_))
        ));
    }
}
