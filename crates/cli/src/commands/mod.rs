//! Subcommand implementations.

pub mod account;
pub mod search;

use thiserror::Error;

use nursery_core::EmailError;
use nursery_storefront::config::ConfigError;
use nursery_storefront::{ApiError, ClientBuildError, SessionError};

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] ClientBuildError),

    #[error("{}", .0.user_message())]
    Session(#[from] SessionError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    /// The command needs a signed-in customer.
    #[error("Not signed in. Run `nursery login` first.")]
    NotSignedIn,
}
