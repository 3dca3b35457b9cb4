//! Error types for the Ferrogram transports.

use std::net::SocketAddr;

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// How the poll loop reacts to a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The endpoint answered 404. Swallowed.
    NotFound,
    /// Network failures, timeouts, rate limits and server errors. Swallowed.
    Transient,
    /// A webhook is registered while polling. Resolved by removing the webhook.
    Conflict,
    /// Anything else. Stops the poll loop.
    Fatal,
}

/// Errors returned by Bot API calls.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The platform answered with an error.
    #[error("api error {code}: {description}")]
    Api {
        /// HTTP-style error code.
        code: u16,
        /// Human readable description.
        description: String,
        /// Seconds to wait before retrying, for rate limits.
        retry_after: Option<u64>,
    },

    /// The response could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// Creates an API error without retry information.
    pub fn api(code: u16, description: impl Into<String>) -> Self {
        Self::Api {
            code,
            description: description.into(),
            retry_after: None,
        }
    }

    /// Classifies this error for the poll loop.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Api { code: 404, .. } => ErrorClass::NotFound,
            Self::Api { code: 409, .. } => ErrorClass::Conflict,
            Self::Api { code: 429, .. } | Self::Api { code: 500..=599, .. } => {
                ErrorClass::Transient
            }
            Self::Network(_) | Self::Timeout => ErrorClass::Transient,
            Self::Api { .. } | Self::InvalidResponse(_) | Self::InvalidConfig(_) => {
                ErrorClass::Fatal
            }
        }
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            Self::InvalidConfig(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type for Bot API calls.
pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// Poll Errors
// =============================================================================

/// Errors that stop the poll loop.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    /// A transport error classified as fatal.
    #[error("polling stopped: {0}")]
    Transport(#[from] TransportError),

    /// Removing the webhook did not resolve repeated conflicts.
    #[error("webhook conflict persisted after {attempts} retries")]
    ConflictRetriesExhausted {
        /// Retries made before giving up.
        attempts: u32,
    },
}

/// Result type for poll iterations.
pub type PollResult<T> = Result<T, PollError>;

// =============================================================================
// Push Errors
// =============================================================================

/// Errors raised while starting the webhook receiver.
#[derive(Debug, Error)]
pub enum PushError {
    /// `create_server` was called while a server is running.
    #[error("push server already running on {0}")]
    AlreadyRunning(SocketAddr),

    /// The listen address could not be resolved or bound.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The requested address.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// Certificate or key could not be loaded.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// TLS was requested in a build without the `tls` feature.
    #[error("TLS requested but the `tls` feature is disabled")]
    TlsUnavailable,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for push server operations.
pub type PushResult<T> = Result<T, PushError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(TransportError::api(404, "Not Found").class(), ErrorClass::NotFound);
        assert_eq!(
            TransportError::api(409, "Conflict: can't use getUpdates while webhook is active").class(),
            ErrorClass::Conflict
        );
        assert_eq!(TransportError::api(429, "Too Many Requests").class(), ErrorClass::Transient);
        assert_eq!(TransportError::api(502, "Bad Gateway").class(), ErrorClass::Transient);
        assert_eq!(TransportError::Timeout.class(), ErrorClass::Transient);
        assert_eq!(TransportError::api(401, "Unauthorized").class(), ErrorClass::Fatal);
        assert_eq!(
            TransportError::InvalidResponse("not json".into()).class(),
            ErrorClass::Fatal
        );
    }
}
