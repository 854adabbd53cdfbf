mod auth_support;

use std::sync::Arc;
use std::time::Duration;

use extkit::auth::{AuthError, CredentialManager, LoopbackAuthorizer, MemoryStore};
use tokio::sync::mpsc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{pending_state, query_param, test_config, token_body};

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local addr")
        .port()
}

struct Harness {
    manager: Arc<CredentialManager>,
    store: Arc<MemoryStore>,
    urls: mpsc::UnboundedReceiver<String>,
    redirect: String,
}

fn harness(token_base: &str, configure: impl FnOnce(LoopbackAuthorizer) -> LoopbackAuthorizer) -> Harness {
    let redirect = format!("http://127.0.0.1:{}/callback", free_port());
    let (tx, urls) = mpsc::unbounded_channel();
    let authorizer = configure(
        LoopbackAuthorizer::new()
            .without_browser()
            .with_url_hook(move |url| {
                let _ = tx.send(url.to_string());
            }),
    );
    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(CredentialManager::new(
        test_config(token_base).with_redirect_uri(redirect.clone()),
        store.clone(),
        Arc::new(authorizer),
    ));
    Harness {
        manager,
        store,
        urls,
        redirect,
    }
}

#[tokio::test]
async fn loopback_login_captures_redirect_and_exchanges_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=loop-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A1", Some("R1"), 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), |a| a.with_timeout(Duration::from_secs(10)));
    let manager = h.manager.clone();
    let login = tokio::spawn(async move { manager.login().await });

    let auth_url = h.urls.recv().await.expect("authorization url");
    let state = query_param(&auth_url, "state").expect("state param");
    assert_eq!(query_param(&auth_url, "redirect_uri").as_deref(), Some(h.redirect.as_str()));

    let client = reqwest::Client::new();
    let stray = client
        .get(h.redirect.replace("/callback", "/favicon.ico"))
        .send()
        .await
        .expect("stray request");
    assert_eq!(stray.status().as_u16(), 404);

    let page = client
        .get(format!("{}?code=loop-code&state={state}", h.redirect))
        .send()
        .await
        .expect("redirect request");
    assert_eq!(page.status().as_u16(), 200);
    assert!(page.text().await.expect("body").contains("Authorization complete"));

    let token = login.await.expect("join").expect("login");
    assert_eq!(token, "A1");
    assert!(h.manager.is_logged_in().await.expect("is_logged_in"));
    assert!(pending_state(h.store.as_ref()).is_none());
}

#[tokio::test]
async fn cancelling_a_pending_loopback_login_leaves_no_state_behind() {
    let cancel = tokio_util::sync::CancellationToken::new();
    let token = cancel.clone();
    let mut h = harness("http://127.0.0.1:1", move |a| a.with_cancellation(token));
    let manager = h.manager.clone();
    let login = tokio::spawn(async move { manager.login().await });

    h.urls.recv().await.expect("authorization url");
    assert!(pending_state(h.store.as_ref()).is_some());
    cancel.cancel();

    assert!(matches!(
        login.await.expect("join"),
        Err(AuthError::Cancelled)
    ));
    assert!(pending_state(h.store.as_ref()).is_none());
    assert!(!h.manager.is_logged_in().await.expect("is_logged_in"));
}

#[tokio::test]
async fn loopback_login_times_out_without_redirect() {
    let h = harness("http://127.0.0.1:1", |a| {
        a.with_timeout(Duration::from_millis(100))
    });

    assert!(matches!(
        h.manager.login().await,
        Err(AuthError::AuthorizationFailed(_))
    ));
    assert!(pending_state(h.store.as_ref()).is_none());
}

#[tokio::test]
async fn loopback_redirect_reporting_denial_maps_to_access_denied() {
    let mut h = harness("http://127.0.0.1:1", |a| a.with_timeout(Duration::from_secs(10)));
    let manager = h.manager.clone();
    let login = tokio::spawn(async move { manager.login().await });

    h.urls.recv().await.expect("authorization url");
    reqwest::get(format!("{}?error=access_denied", h.redirect))
        .await
        .expect("redirect request");

    assert!(matches!(
        login.await.expect("join"),
        Err(AuthError::AccessDenied)
    ));
}

#[tokio::test]
async fn idle_connection_does_not_block_the_real_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=after-idle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A1", Some("R1"), 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), |a| a.with_timeout(Duration::from_secs(10)));
    let manager = h.manager.clone();
    let login = tokio::spawn(async move { manager.login().await });

    let auth_url = h.urls.recv().await.expect("authorization url");
    let state = query_param(&auth_url, "state").expect("state param");

    // A preconnect that never sends a request line.
    let listener_addr = h
        .redirect
        .trim_start_matches("http://")
        .trim_end_matches("/callback")
        .to_string();
    let _idle = tokio::net::TcpStream::connect(&listener_addr)
        .await
        .expect("idle connection");

    let page = reqwest::get(format!("{}?code=after-idle&state={state}", h.redirect))
        .await
        .expect("redirect request");
    assert_eq!(page.status().as_u16(), 200);

    let token = tokio::time::timeout(Duration::from_secs(5), login)
        .await
        .expect("login should not wait on the idle connection")
        .expect("join")
        .expect("login");
    assert_eq!(token, "A1");
}
