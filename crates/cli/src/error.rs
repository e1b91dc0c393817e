//! CLI errors.

use crumb_client::ClientError;
use crumb_client::cart::CartError;
use crumb_client::config::ConfigError;
use crumb_client::storage::StorageError;
use crumb_core::Role;
use thiserror::Error;

/// Errors that end a `crumb` invocation.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// The command needs a logged-in user.
    #[error("Not logged in. Run `crumb login` first")]
    NotLoggedIn,

    /// The logged-in user's role may not run the command.
    #[error("Not available to {role} accounts (home: {home})")]
    Forbidden { role: Role, home: &'static str },

    /// A command argument was rejected.
    #[error("Invalid input: {0}")]
    Input(String),
}

impl From<crumb_client::session::SessionError> for CliError {
    fn from(err: crumb_client::session::SessionError) -> Self {
        Self::Client(err.into())
    }
}

impl From<crumb_client::checkout::CheckoutError> for CliError {
    fn from(err: crumb_client::checkout::CheckoutError) -> Self {
        Self::Client(err.into())
    }
}

pub type CliResult<T = ()> = Result<T, CliError>;
