//! Domain error types.

use common::EntityKey;
use thiserror::Error;

/// Errors raised by business rules and entity construction.
///
/// These pass through the persistence core unchanged.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A value or invariant was violated while building an entity.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: EntityKey },

    /// An illegal state transition was attempted.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An event payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(kind: &'static str, key: EntityKey) -> Self {
        Self::NotFound { kind, key }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
