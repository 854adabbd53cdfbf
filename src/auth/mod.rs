//! OAuth credential lifecycle: persistence, CSRF state, interactive login,
//! transparent refresh and revocation.

pub mod authorizer;
pub mod consumer;
pub mod credential;
pub mod error;
pub mod manager;
pub mod state;
pub mod store;

pub use authorizer::{
    AuthorizationOutcome, AuthorizationRequest, BrowserRedirect, InteractiveAuthorizer,
    LoopbackAuthorizer,
};
pub use consumer::with_valid_token;
pub use credential::Credential;
pub use error::AuthError;
pub use manager::CredentialManager;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreKeys};
