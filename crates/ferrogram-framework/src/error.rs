//! Error types for the Ferrogram framework.

use thiserror::Error;

/// Errors raised while configuring a [`CommandRouter`](crate::CommandRouter).
///
/// These are programmer errors and are returned synchronously from the
/// configuring call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A command name or alias is empty or contains whitespace.
    #[error("invalid command registration: {0}")]
    InvalidRegistration(String),

    /// The prefix is empty or contains whitespace.
    #[error("invalid command prefix: {0:?}")]
    InvalidPrefix(String),
}

/// Result type for router configuration.
pub type RouterResult<T> = Result<T, RouterError>;
