//! CLI command implementations.

pub mod account;
pub mod addresses;
pub mod admin;
pub mod migrate;

use secrecy::SecretString;
use thiserror::Error;

use porchlight_client::{
    AddressStore, AuthError, ClientConfig, ConfigError, IdentityResolver, RestClient,
};

/// Errors surfaced by any command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sign-in failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Admin(#[from] admin::AdminError),

    #[error(transparent)]
    Migration(#[from] migrate::MigrationError),

    #[error("Not signed in")]
    SignedOut,

    #[error("Address was not saved")]
    NotSaved,
}

/// Credentials for commands that act as a signed-in user.
pub struct Login {
    pub email: String,
    pub password: SecretString,
}

/// A signed-in connection to the backend.
pub struct Connection {
    pub config: ClientConfig,
    pub client: RestClient,
    pub identity: IdentityResolver<RestClient, RestClient>,
}

impl Connection {
    /// Load config from the environment and sign in.
    pub async fn open(login: &Login) -> Result<Self, CommandError> {
        let config = ClientConfig::from_env()?;
        let client = RestClient::new(&config)?;
        let identity = IdentityResolver::new(client.clone(), client.clone())
            .with_table(config.admin_table.as_str());

        identity.sign_in(&login.email, &login.password).await?;

        Ok(Self {
            config,
            client,
            identity,
        })
    }

    /// An address store bound to this connection's session.
    pub fn addresses(&self) -> AddressStore<RestClient, RestClient> {
        AddressStore::new(self.client.clone(), self.client.clone())
            .with_table(self.config.addresses_table.as_str())
    }

    /// End the session; failures are logged, not returned.
    pub async fn close(self) {
        if let Err(error) = self.identity.sign_out().await {
            tracing::warn!(%error, "Sign-out failed");
        }
    }
}
