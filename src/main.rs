//! extkit CLI binary entry point.

use clap::Parser;
use extkit::cli::{AuthCommands, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Auth(auth_args) => match &auth_args.command {
            AuthCommands::Login(args) => {
                extkit::cli::auth::handle_login(&auth_args, args.timeout_secs, args.no_browser)
                    .await
            }
            AuthCommands::Status => extkit::cli::auth::handle_status(&auth_args).await,
            AuthCommands::Token(args) => {
                extkit::cli::auth::handle_token(&auth_args, args.timeout_secs, args.no_browser)
                    .await
            }
            AuthCommands::Logout => extkit::cli::auth::handle_logout(&auth_args).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
