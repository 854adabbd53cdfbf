//! CLI entry point for extkit.

pub mod auth;

use clap::{Parser, Subcommand};

/// extkit CLI
#[derive(Parser, Debug)]
#[command(name = "extkit", version, about = "Google OAuth credential helper")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    /// OAuth scope the credential is stored under (defaults to GOOGLE_OAUTH_SCOPE or "email")
    #[arg(long, global = true)]
    pub scope: Option<String>,

    /// Directory holding credential files (defaults to ~/.extkit)
    #[arg(long, global = true)]
    pub store_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in through the browser
    Login(LoginArgs),
    /// Show whether a credential is stored and when it expires
    Status,
    /// Print a valid access token, refreshing it if needed
    Token(LoginArgs),
    /// Revoke the token and delete the stored credential
    Logout,
}

/// Arguments for `extkit auth login` and `extkit auth token` (which may
/// fall back to a browser login).
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Give up if the browser redirect has not arrived after this many seconds
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,
}
