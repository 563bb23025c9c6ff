use async_trait::async_trait;

use crate::Result;

/// A transactional store.
///
/// The driver opens transactions and hands out a transaction-scoped handle
/// that repositories use to execute statements. The handle is cheap to clone;
/// every clone refers to the same physical transaction.
///
/// Dropping the last clone of an uncommitted handle must release the
/// transaction without applying its writes, so that a cancelled operation
/// never leaves a transaction open.
#[async_trait]
pub trait StorageDriver: Send + Sync + 'static {
    /// Transaction-scoped execution handle.
    type Transaction: Clone + Send + Sync + 'static;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Commits the transaction. The handle is unusable afterwards.
    async fn commit(&self, tx: Self::Transaction) -> Result<()>;

    /// Rolls the transaction back. The handle is unusable afterwards.
    async fn rollback(&self, tx: Self::Transaction) -> Result<()>;
}
