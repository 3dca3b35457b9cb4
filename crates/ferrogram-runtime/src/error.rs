//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use ferrogram_core::CoreError;
use ferrogram_framework::RouterError;
use ferrogram_transport::{PushError, TransportError};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No bot token was configured.
    #[error("Bot token missing; set bot.token or FERROGRAM_BOT__TOKEN")]
    MissingToken,

    /// A Bot API call failed.
    #[error("Bot API error: {0}")]
    Transport(#[from] TransportError),

    /// The API returned an entity that could not be cached.
    #[error("Unexpected entity payload: {0}")]
    Entity(#[from] CoreError),

    /// The webhook server could not be started.
    #[error("Webhook error: {0}")]
    Push(#[from] PushError),

    /// Invalid command router setup.
    #[error("Command router error: {0}")]
    Router(#[from] RouterError),

    /// Waiting for a shutdown signal failed.
    #[error("Signal error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
