//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a [`FerrogramConfig`](super::FerrogramConfig).
///
/// Validation errors carry the dotted path of the offending key, e.g.
/// `webhook.port`, so they can be matched against the file or the
/// `FERROGRAM_WEBHOOK__PORT` variable that set it.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The extension is unknown, or its format feature is disabled.
    #[error("unsupported configuration file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The merged sources do not fit the schema.
    #[error("failed to extract configuration: {0}")]
    Extract(Box<figment::Error>),

    #[error("invalid `{key}`: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("invalid `{key}` url {url:?}: {reason}")]
    InvalidUrl {
        key: &'static str,
        url: String,
        reason: &'static str,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }

    /// The configuration key this error refers to, if any.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::Invalid { key, .. } | Self::InvalidUrl { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
