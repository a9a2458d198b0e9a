//! Basket CLI - Cart and favorites from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Fill a guest cart
//! basket cart add 42 -q 2
//! basket favorites toggle 7
//!
//! # Sign in; guest entries move to the account
//! basket login -e shopper@example.com -p hunter2
//!
//! # Inspect
//! basket cart list
//! basket status
//!
//! # Back to the guest collections
//! basket logout
//! ```
//!
//! # Commands
//!
//! - `cart` - Add, set, remove, clear and list cart entries
//! - `favorites` - Add, remove, toggle and list favorites
//! - `login` / `logout` - Manage the persisted session
//! - `status` - Show session and collection sizes
//!
//! # Environment Variables
//!
//! - `BASKET_API_URL` - Storefront REST API base URL (required)
//! - `BASKET_STATE_DIR` - Directory for guest collections and the session
//! - `SENTRY_DSN` - Enables error reporting when set

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use basket_client::{ClientConfig, FileStorage, Storefront};
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;

use commands::{CartAction, FavoritesAction};
use error::CliError;

#[derive(Parser)]
#[command(name = "basket")]
#[command(author, version, about = "Basket cart and favorites client")]
struct Cli {
    /// Directory for guest collections and the session (overrides
    /// `BASKET_STATE_DIR`)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Sign in; guest entries are moved to the account
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Sign out and return to the guest collections
    Logout,
    /// Show session and collection sizes
    Status,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            report_failure(&CliError::from(e));
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = cli.state_dir.clone() {
        config.state_dir = dir;
    }

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    // Log to stderr so command output stays clean on stdout
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "basket_client=info,basket_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let storage = Arc::new(FileStorage::new(&config.state_dir));
    let storefront = Storefront::new(config, storage)?;
    let mut notices = storefront.notifier().subscribe();

    storefront.resume().await?;

    let result = match cli.command {
        Commands::Cart { action } => commands::cart(&storefront, action).await,
        Commands::Favorites { action } => commands::favorites(&storefront, action).await,
        Commands::Login { email, password } => {
            commands::login(&storefront, &email, password).await
        }
        Commands::Logout => {
            commands::logout(&storefront).await;
            Ok(())
        }
        Commands::Status => {
            commands::status(&storefront);
            Ok(())
        }
    };

    commands::print_notices(&mut notices);
    result
}

#[allow(clippy::print_stderr)]
fn report_failure(error: &CliError) {
    eprintln!("error: {error}");
}
