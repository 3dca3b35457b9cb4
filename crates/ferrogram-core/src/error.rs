//! Error types for the Ferrogram core.

use thiserror::Error;

use crate::entity::EntityKind;

/// Errors raised while normalizing platform payloads.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A payload could not be turned into a typed value.
    ///
    /// Raised when a mandatory identity field is missing or when an envelope
    /// body is not valid JSON. Never aborts more than the single payload.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload {
        /// What was being built.
        kind: &'static str,
        /// Reason for failure.
        reason: String,
    },
}

impl CoreError {
    /// Creates a malformed payload error for an entity kind.
    pub fn malformed(kind: EntityKind, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            kind: kind.as_str(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed payload error for a non-entity structure.
    pub fn malformed_other(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            kind,
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
