//! Interactive authorization strategies.
//!
//! A strategy takes the built authorization URL and hands it to the user
//! agent. It either reports that a full-page redirect was started (the
//! provider will call back into the host later) or returns the redirect URL
//! directly once the user has consented.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::AuthError;
use crate::config::OAuthConfig;

const MAX_REQUEST_BYTES: usize = 8 * 1024;
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);
const CALLBACK_PAGE: &str = "<!doctype html><html><body><p>Authorization complete. You can close this window.</p></body></html>";

/// A ready-to-open authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub redirect_uri: String,
    pub state: String,
}

impl AuthorizationRequest {
    /// Build the provider authorization URL for an offline, consent-forced
    /// authorization-code grant.
    pub fn new(config: &OAuthConfig, client_id: &str, state: &str) -> Result<Self, AuthError> {
        let url = Url::parse_with_params(
            &config.endpoints.authorize_url,
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("access_type", "offline"),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("scope", config.scope.as_str()),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|err| {
            AuthError::NotConfigured(format!(
                "invalid authorize URL {}: {err}",
                config.endpoints.authorize_url
            ))
        })?;
        Ok(Self {
            url: url.into(),
            redirect_uri: config.redirect_uri.clone(),
            state: state.to_string(),
        })
    }
}

/// Result of handing an authorization request to the user agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The user agent navigated away; completion arrives through
    /// `CredentialManager::handle_auth_callback`.
    Redirected,
    /// The provider's redirect (carrying `code` and `state`) was captured.
    RedirectUrl(String),
}

/// Strategy that drives the user through the provider's consent screen.
#[async_trait]
pub trait InteractiveAuthorizer: Send + Sync {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, AuthError>;
}

type UrlHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Full-page redirect: open the URL and let the host's callback page finish
/// the login.
#[derive(Clone)]
pub struct BrowserRedirect {
    open_browser: bool,
    on_url: Option<UrlHook>,
}

impl Default for BrowserRedirect {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserRedirect {
    pub fn new() -> Self {
        Self {
            open_browser: true,
            on_url: None,
        }
    }

    /// Skip launching a browser; only the URL hook sees the URL.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    pub fn with_url_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_url = Some(Arc::new(hook));
        self
    }
}

#[async_trait]
impl InteractiveAuthorizer for BrowserRedirect {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, AuthError> {
        if let Some(hook) = &self.on_url {
            hook(&request.url);
        }
        if self.open_browser && !try_open_browser(&request.url) {
            tracing::warn!(url = %request.url, "Could not launch a browser; open the URL manually");
        }
        Ok(AuthorizationOutcome::Redirected)
    }
}

/// Captures the provider redirect on a local listener bound to the redirect
/// URI's host and port, then returns the full redirect URL.
///
/// The wait ends when the redirect arrives, the optional timeout elapses, or
/// the cancellation token fires.
#[derive(Clone)]
pub struct LoopbackAuthorizer {
    cancel: CancellationToken,
    timeout: Option<Duration>,
    open_browser: bool,
    on_url: Option<UrlHook>,
}

impl Default for LoopbackAuthorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackAuthorizer {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            timeout: None,
            open_browser: true,
            on_url: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    /// Called with the authorization URL once the listener is accepting.
    pub fn with_url_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_url = Some(Arc::new(hook));
        self
    }

    /// Token that aborts a pending wait, e.g. when the user closes the prompt.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accept connections until one carries the redirect. Each connection is
    /// served on its own task, so an idle or slow client cannot hold up the
    /// browser's real request.
    async fn wait_for_redirect(
        listener: &TcpListener,
        redirect: &Url,
    ) -> Result<String, AuthError> {
        let (tx, mut rx) = mpsc::channel::<String>(1);
        loop {
            tokio::select! {
                Some(target) = rx.recv() => {
                    let mut captured = redirect.clone();
                    captured.set_query(target.split_once('?').map(|(_, query)| query));
                    return Ok(captured.into());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    tokio::spawn(serve_connection(
                        stream,
                        peer,
                        redirect.path().to_string(),
                        tx.clone(),
                    ));
                }
            }
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    redirect_path: String,
    captured: mpsc::Sender<String>,
) {
    let target = match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_target(&mut stream))
        .await
    {
        Ok(Ok(target)) => target,
        Ok(Err(err)) => {
            tracing::debug!(%peer, error = %err, "Ignoring malformed loopback request");
            return;
        }
        Err(_) => {
            tracing::debug!(%peer, "Dropping idle loopback connection");
            return;
        }
    };
    let path = target.split('?').next().unwrap_or_default();
    if path != redirect_path {
        let _ = write_response(&mut stream, "404 Not Found", "").await;
        return;
    }
    let _ = write_response(&mut stream, "200 OK", CALLBACK_PAGE).await;
    // Only the first redirect counts; later ones find the channel full or closed.
    let _ = captured.try_send(target);
}

#[async_trait]
impl InteractiveAuthorizer for LoopbackAuthorizer {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, AuthError> {
        let redirect = Url::parse(&request.redirect_uri).map_err(|err| {
            AuthError::NotConfigured(format!(
                "invalid redirect URI {}: {err}",
                request.redirect_uri
            ))
        })?;
        let host = redirect.host_str().unwrap_or("127.0.0.1").to_string();
        let port = redirect.port_or_known_default().ok_or_else(|| {
            AuthError::NotConfigured(format!("redirect URI {} has no port", request.redirect_uri))
        })?;

        let listener = TcpListener::bind((host.as_str(), port)).await?;
        tracing::debug!(%host, port, "Waiting for OAuth redirect");

        if let Some(hook) = &self.on_url {
            hook(&request.url);
        }
        if self.open_browser && !try_open_browser(&request.url) {
            tracing::warn!(url = %request.url, "Could not launch a browser; open the URL manually");
        }

        let wait = Self::wait_for_redirect(&listener, &redirect);
        let captured = match self.timeout {
            Some(limit) => tokio::select! {
                _ = self.cancel.cancelled() => return Err(AuthError::Cancelled),
                result = tokio::time::timeout(limit, wait) => result.map_err(|_| {
                    AuthError::AuthorizationFailed(format!(
                        "no redirect received within {}s",
                        limit.as_secs()
                    ))
                })??,
            },
            None => tokio::select! {
                _ = self.cancel.cancelled() => return Err(AuthError::Cancelled),
                result = wait => result?,
            },
        };
        Ok(AuthorizationOutcome::RedirectUrl(captured))
    }
}

/// `code` and `state` extracted from a provider redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RedirectParams {
    pub code: String,
    pub state: Option<String>,
}

pub(crate) fn parse_redirect_url(raw: &str) -> Result<RedirectParams, AuthError> {
    let url = Url::parse(raw)
        .map_err(|err| AuthError::AuthorizationFailed(format!("invalid redirect URL: {err}")))?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(match error.as_str() {
            "access_denied" => AuthError::AccessDenied,
            _ => AuthError::AuthorizationFailed(error),
        });
    }
    let code = code.filter(|c| !c.is_empty()).ok_or_else(|| {
        AuthError::AuthorizationFailed("No authorization code received".to_string())
    })?;
    Ok(RedirectParams { code, state })
}

async fn read_request_target(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(AuthError::InvalidResponse("request too large".to_string()));
        }
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(AuthError::InvalidResponse(format!(
            "unexpected request line: {request_line}"
        ))),
    }
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Best-effort browser opener.
pub fn try_open_browser(url: &str) -> bool {
    #[cfg(target_os = "macos")]
    {
        return std::process::Command::new("open")
            .arg(url)
            .status()
            .is_ok_and(|status| status.success());
    }
    #[cfg(target_os = "windows")]
    {
        return std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .status()
            .is_ok_and(|status| status.success());
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        return std::process::Command::new("xdg-open")
            .arg(url)
            .status()
            .is_ok_and(|status| status.success());
    }
    #[allow(unreachable_code)]
    false
}
