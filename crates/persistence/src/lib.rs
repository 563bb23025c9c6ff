//! Storage drivers, repository contracts and the repository factory.
//!
//! This crate provides:
//! - [`StorageDriver`], the begin/commit/rollback contract of a transactional store
//! - [`Repository`], per-kind persistence bound to a transaction handle
//! - [`RepositoryFactory`], the kind-keyed registry with a startup self-check
//! - [`InMemoryDriver`] and [`PostgresDriver`] implementations

pub mod driver;
pub mod error;
pub mod factory;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use driver::StorageDriver;
pub use error::{ConfigurationError, Error, ErrorCategory, Result, StorageError};
pub use factory::RepositoryFactory;
pub use memory::{InMemoryDriver, InMemoryRepository, InMemoryTransaction};
pub use postgres::{PgTransaction, PostgresDriver, PostgresJsonRepository};
pub use repository::{Repository, RepositoryExt};
