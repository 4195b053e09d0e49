//! Nursery CLI - drive the storefront core from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session is persisted between runs)
//! nursery login -e rosa@garden.example --password hunter22
//!
//! # Who is signed in?
//! nursery whoami
//!
//! # Update the profile
//! nursery profile update --phone 555-0101 --city Portland
//!
//! # Type a query and watch the suggestions settle
//! nursery search "monstera"
//!
//! # Sign out
//! nursery logout
//! ```
//!
//! # Environment Variables
//!
//! - `NURSERY_API_URL` - Backend base URL
//! - `NURSERY_SESSION_FILE` - Where the session is persisted
//! - `NURSERY_PASSWORD` - Password for `login` and `register`
//! - `SENTRY_DSN` - Enables error reporting when set
//! - `RUST_LOG` - Log filter

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use nursery_storefront::{Storefront, StorefrontConfig};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "nursery")]
#[command(author, version, about = "Nursery storefront command-line client")]
struct Cli {
    /// Backend base URL (overrides `NURSERY_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(long, env = "NURSERY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in to it
    Register(commands::account::RegisterArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in customer
    Whoami,
    /// Manage the signed-in customer's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Change the signed-in customer's password
    ChangePassword {
        #[arg(long)]
        current: String,

        #[arg(long)]
        new: String,
    },
    /// Request a password reset email
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Type a query one keystroke at a time and print the suggestions
    Search {
        query: String,

        /// Delay between simulated keystrokes
        #[arg(long, default_value_t = 80)]
        keystroke_ms: u64,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Fetch the profile from the backend
    Show,
    /// Change profile fields; omitted fields are kept
    Update(commands::account::ProfileArgs),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
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
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nursery_storefront=info,nursery_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = StorefrontConfig::from_env()?;
    if let Some(api_url) = cli.api_url {
        config = config.with_base_url(api_url);
    }
    let storefront = Storefront::new(config)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::account::login(&storefront, &email, password).await?;
        }
        Commands::Register(args) => commands::account::register(&storefront, args).await?,
        Commands::Logout => commands::account::logout(&storefront).await,
        Commands::Whoami => commands::account::whoami(&storefront).await,
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::account::show_profile(&storefront).await?,
            ProfileAction::Update(args) => {
                commands::account::update_profile(&storefront, args).await?;
            }
        },
        Commands::ChangePassword { current, new } => {
            commands::account::change_password(&storefront, current, new).await?;
        }
        Commands::ForgotPassword { email } => {
            commands::account::forgot_password(&storefront, &email).await?;
        }
        Commands::Search {
            query,
            keystroke_ms,
        } => {
            commands::search::type_query(
                &storefront,
                &query,
                std::time::Duration::from_millis(keystroke_ms),
            )
            .await?;
        }
    }
    Ok(())
}
