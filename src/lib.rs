//! extkit: Google OAuth credential management for browser-extension style
//! hosts, plus thin Docs and Sheets REST wrappers.
//!
//! The centerpiece is [`auth::CredentialManager`], which owns one persisted
//! credential per OAuth scope and keeps it usable: it runs the interactive
//! authorization-code flow, validates the CSRF state on the callback,
//! refreshes expired access tokens transparently and revokes on logout.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use extkit::auth::{CredentialManager, FileStore, LoopbackAuthorizer};
//! use extkit::config::OAuthConfig;
//! use extkit::google::GoogleClient;
//!
//! # async fn example() -> extkit::error::Result<()> {
//! let manager = Arc::new(CredentialManager::new(
//!     OAuthConfig::from_env().with_scope("https://www.googleapis.com/auth/documents"),
//!     Arc::new(FileStore::new_default()),
//!     Arc::new(LoopbackAuthorizer::new()),
//! ));
//! let google = GoogleClient::new(manager);
//! let doc_id = google.create_document("Notes").await?;
//! google.append_text(&doc_id, "Hello!").await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod google;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
