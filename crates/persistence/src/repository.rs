use async_trait::async_trait;
use common::EntityKey;
use domain::{DomainError, EntityKind, Record};

use crate::Result;

/// Persistence for one aggregate or entity kind.
///
/// A repository is bound to the transaction handle it was constructed with;
/// every call executes inside that transaction.
#[async_trait]
pub trait Repository<R: Record>: Send + Sync {
    /// The kind this repository persists.
    fn kind(&self) -> R::Kind;

    /// Inserts a new record.
    async fn create(&self, record: &R) -> Result<()>;

    /// Replaces an existing record.
    async fn update(&self, record: &R) -> Result<()>;

    /// Removes the record with the given key.
    async fn delete(&self, key: &EntityKey) -> Result<()>;

    /// Looks a record up by key.
    async fn find_by_id(&self, key: &EntityKey) -> Result<Option<R>>;
}

/// Extension trait providing convenience methods for repositories.
#[async_trait]
pub trait RepositoryExt<R: Record>: Repository<R> {
    /// Looks a record up, failing with `NotFound` when it is absent.
    async fn get(&self, key: &EntityKey) -> Result<R> {
        self.find_by_id(key)
            .await?
            .ok_or_else(|| DomainError::not_found(self.kind().name(), key.clone()).into())
    }

    /// Checks whether a record exists.
    async fn exists(&self, key: &EntityKey) -> Result<bool> {
        Ok(self.find_by_id(key).await?.is_some())
    }
}

// Blanket implementation for all repositories
impl<R: Record, T: Repository<R> + ?Sized> RepositoryExt<R> for T {}
