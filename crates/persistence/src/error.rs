use std::time::Duration;

use common::EntityKey;
use domain::DomainError;
use thiserror::Error;

/// Errors surfaced by repositories, drivers and the unit of work.
///
/// Nothing in the persistence core catches or rewrites these: every error
/// reaches the operation that owns the transaction unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// A business rule failed (validation, missing entity, conflict).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Programmer misuse: missing registration or transaction misuse.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Opaque failure from the underlying store.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The transaction did not finish within the configured timeout.
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),
}

/// Misuse of the persistence core. These should never reach production.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no repository registered for {kind}")]
    RepositoryNotRegistered { kind: &'static str },

    #[error("repositories missing for: {}", .kinds.join(", "))]
    MissingRegistrations { kinds: Vec<&'static str> },

    #[error("repository for {kind} registered twice")]
    DuplicateRegistration { kind: &'static str },

    #[error("a transaction is already open on this unit of work")]
    TransactionAlreadyOpen,

    #[error("this unit of work has already finished its transaction")]
    TransactionFinished,

    #[error("no open transaction")]
    NoOpenTransaction,

    #[error("cascade depth limit {max} exceeded: {}", .path.join(" -> "))]
    CascadeDepthExceeded { max: usize, path: Vec<String> },

    #[error("cannot {operation} while a save is in progress")]
    CascadeInProgress { operation: &'static str },
}

/// Failures reported by a storage driver or repository.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} with key {key} already exists")]
    DuplicateKey { kind: &'static str, key: EntityKey },

    #[error("{kind} with key {key} was changed by another transaction")]
    WriteConflict { kind: &'static str, key: EntityKey },

    #[error("transaction handle is closed")]
    TransactionClosed,

    #[error("{0}")]
    Backend(String),
}

/// Coarse classification used by the calling layer to pick a user-facing
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Configuration,
    Storage,
    Timeout,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Domain(DomainError::Validation(_)) => ErrorCategory::Validation,
            Error::Domain(DomainError::NotFound { .. }) => ErrorCategory::NotFound,
            Error::Domain(DomainError::Conflict(_)) => ErrorCategory::Conflict,
            Error::Domain(DomainError::Serialization(_)) => ErrorCategory::Validation,
            Error::Configuration(_) => ErrorCategory::Configuration,
            Error::Storage(StorageError::DuplicateKey { .. })
            | Error::Storage(StorageError::WriteConflict { .. }) => ErrorCategory::Conflict,
            Error::Storage(_) => ErrorCategory::Storage,
            Error::Timeout(_) => ErrorCategory::Timeout,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Storage(StorageError::Database(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(StorageError::Serialization(e))
    }
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, Error>;
