//! CLI auth command handlers for login, status, token, and logout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::AuthArgs;
use crate::auth::{
    BrowserRedirect, CredentialManager, FileStore, InteractiveAuthorizer, LoopbackAuthorizer,
};
use crate::config::OAuthConfig;

fn build_manager(args: &AuthArgs, authorizer: Arc<dyn InteractiveAuthorizer>) -> CredentialManager {
    let mut config = OAuthConfig::from_env();
    if let Some(scope) = &args.scope {
        config = config.with_scope(scope.clone());
    }
    let store = match &args.store_dir {
        Some(dir) => FileStore::new(dir.clone()),
        None => FileStore::new_default(),
    };
    CredentialManager::new(config, Arc::new(store), authorizer)
}

/// Loopback authorizer bounded by `timeout_secs` that Ctrl-C cancels.
/// The authorization URL goes to stderr so stdout stays clean for `token`.
fn loopback_authorizer(timeout_secs: u64, no_browser: bool) -> LoopbackAuthorizer {
    let mut authorizer = LoopbackAuthorizer::new()
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_url_hook(|url| eprintln!("🔗 Visit: {url}"));
    if no_browser {
        authorizer = authorizer.without_browser();
    }

    let cancel = authorizer.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    authorizer
}

/// Handle `extkit auth login`.
pub async fn handle_login(
    args: &AuthArgs,
    timeout_secs: u64,
    no_browser: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(args, Arc::new(loopback_authorizer(timeout_secs, no_browser)));
    eprintln!("⏳ Waiting for authorization...");
    manager.login().await?;
    println!("✅ Signed in ({})", manager.scope());
    Ok(())
}

/// Handle `extkit auth status`.
pub async fn handle_status(args: &AuthArgs) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(args, Arc::new(BrowserRedirect::new().without_browser()));

    println!("🔐 Authentication Status ({})\n", manager.scope());
    match manager.credential().await? {
        Some(credential) if credential.is_expired_at(Utc::now()) => {
            println!("  ⚠️  Token expired (will refresh on next use)");
        }
        Some(credential) => {
            println!(
                "  ✅ Logged in (expires {})",
                credential.expires_at.format("%Y-%m-%d %H:%M")
            );
        }
        None => println!("  ❌ Not logged in"),
    }

    println!("\n📌 Environment Variables:");
    for env_key in ["GOOGLE_OAUTH_CLIENT_ID", "GOOGLE_OAUTH_CLIENT_SECRET"] {
        let status = if std::env::var(env_key).is_ok() {
            "✅ Set"
        } else {
            "❌ Not set"
        };
        println!("  {env_key}: {status}");
    }
    Ok(())
}

/// Handle `extkit auth token`.
pub async fn handle_token(
    args: &AuthArgs,
    timeout_secs: u64,
    no_browser: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(args, Arc::new(loopback_authorizer(timeout_secs, no_browser)));
    let token = manager.get_access_token().await?;
    println!("{token}");
    Ok(())
}

/// Handle `extkit auth logout`.
pub async fn handle_logout(args: &AuthArgs) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(args, Arc::new(BrowserRedirect::new().without_browser()));
    manager.revoke_token().await?;
    println!("✅ Logged out ({})", manager.scope());
    Ok(())
}
