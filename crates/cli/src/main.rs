//! Porchlight CLI - session tools, database migrations and admin grants.
//!
//! # Usage
//!
//! ```bash
//! # Show who the credentials resolve to
//! porchlight whoami --email ada@example.com
//!
//! # List or add addresses for the signed-in user
//! porchlight addresses --email ada@example.com list
//! porchlight addresses add --house-number 12 --street Elm --area Downtown \
//!     --city Springfield --state IL --pin-code 62701 --mobile 555-0100
//!
//! # Create the addresses and admin_users tables
//! porchlight migrate
//!
//! # Grant or revoke admin access
//! porchlight admin grant --user-id <uuid> --role editor --permission addresses:read
//! porchlight admin revoke --user-id <uuid>
//! porchlight admin list
//! ```
//!
//! # Commands
//!
//! - `whoami` - Resolve the identity behind a set of credentials
//! - `addresses` - List or add the signed-in user's addresses
//! - `migrate` - Run database migrations
//! - `admin` - Manage admin authorization records

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use porchlight_core::NewAddress;

mod commands;

use commands::{CommandError, Login};

#[derive(Parser)]
#[command(name = "porchlight")]
#[command(author, version, about = "Porchlight CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and print the resolved identity
    Whoami {
        #[command(flatten)]
        credentials: Credentials,

        /// Print the identity as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the signed-in user's addresses
    Addresses {
        #[command(flatten)]
        credentials: Credentials,

        #[command(subcommand)]
        action: AddressAction,
    },
    /// Run database migrations
    Migrate,
    /// Manage admin authorization records
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

/// Email/password pair used to open a session.
#[derive(Args)]
struct Credentials {
    /// Account email
    #[arg(short, long, env = "PORCHLIGHT_EMAIL")]
    email: String,

    /// Account password
    #[arg(short, long, env = "PORCHLIGHT_PASSWORD", hide_env_values = true)]
    password: String,
}

impl From<Credentials> for Login {
    fn from(credentials: Credentials) -> Self {
        Self {
            email: credentials.email,
            password: SecretString::from(credentials.password),
        }
    }
}

#[derive(Subcommand)]
enum AddressAction {
    /// List addresses, newest first
    List {
        /// Print the addresses as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a new address
    Add {
        #[arg(long)]
        house_number: String,
        #[arg(long)]
        street: String,
        #[arg(long)]
        area: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        pin_code: String,
        #[arg(long)]
        mobile: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create or update an admin grant
    Grant {
        /// User ID from the auth provider
        #[arg(short, long)]
        user_id: String,

        /// Free-form role label (e.g. `owner`, `editor`)
        #[arg(short, long)]
        role: Option<String>,

        /// Permission string; repeat for several
        #[arg(short, long = "permission")]
        permissions: Vec<String>,

        /// Record the grant without activating it
        #[arg(long)]
        inactive: bool,
    },
    /// Deactivate an admin grant
    Revoke {
        /// User ID from the auth provider
        #[arg(short, long)]
        user_id: String,
    },
    /// List all admin grants
    List,
}

fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT").ok().map(Into::into),
            ..Default::default()
        },
    ));

    Some(guard)
}

fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let _sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "porchlight=info,porchlight_client=info".into());

    // Logs go to stderr; stdout is reserved for command output.
    let json_logs = std::env::var("PORCHLIGHT_LOG_FORMAT").is_ok_and(|f| f == "json");
    let json_layer = json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    match cli.command {
        Commands::Whoami { credentials, json } => {
            commands::account::whoami(&credentials.into(), json).await?;
        }
        Commands::Addresses {
            credentials,
            action,
        } => match action {
            AddressAction::List { json } => {
                commands::addresses::list(&credentials.into(), json).await?;
            }
            AddressAction::Add {
                house_number,
                street,
                area,
                city,
                state,
                pin_code,
                mobile,
            } => {
                let address = NewAddress {
                    house_number,
                    street,
                    area,
                    city,
                    state,
                    pin_code,
                    mobile,
                };
                commands::addresses::add(&credentials.into(), address).await?;
            }
        },
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant {
                user_id,
                role,
                permissions,
                inactive,
            } => {
                commands::admin::grant(&user_id, role.as_deref(), &permissions, !inactive).await?;
            }
            AdminAction::Revoke { user_id } => commands::admin::revoke(&user_id).await?,
            AdminAction::List => commands::admin::list().await?,
        },
    }
    Ok(())
}
