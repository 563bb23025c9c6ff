use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use common::EntityKey;
use domain::{DomainError, EntityKind, Record};
use tokio::sync::{Mutex, RwLock};

use crate::driver::StorageDriver;
use crate::error::{Result, StorageError};
use crate::repository::Repository;

type RowKey<R> = (<R as Record>::Kind, EntityKey);
type Table<R> = HashMap<RowKey<R>, R>;

/// Committed rows plus a version per row key.
///
/// Versions start at 0 for a key that was never written and are bumped on
/// every committed write, deletes included, so they never repeat.
#[derive(Debug)]
struct Committed<R: Record> {
    rows: Table<R>,
    versions: HashMap<RowKey<R>, u64>,
}

impl<R: Record> Committed<R> {
    fn version(&self, row: &RowKey<R>) -> u64 {
        self.versions.get(row).copied().unwrap_or(0)
    }

    fn apply(&mut self, row: RowKey<R>, write: Option<R>) {
        *self.versions.entry(row.clone()).or_insert(0) += 1;
        match write {
            Some(record) => {
                self.rows.insert(row, record);
            }
            None => {
                self.rows.remove(&row);
            }
        }
    }
}

/// In-memory transactional store for tests and development.
///
/// Committed rows live in a shared table. Each transaction stages its writes
/// privately (reads see the transaction's own writes first) and applies them
/// in one step on commit. Rollback, or dropping an uncommitted handle,
/// discards the staged writes.
///
/// Concurrency control is optimistic: a transaction remembers the version of
/// every row it reads or writes, and commit fails with
/// [`StorageError::WriteConflict`] if another transaction committed a write
/// to one of its written rows in the meantime. Nothing is applied in that
/// case.
#[derive(Clone)]
pub struct InMemoryDriver<R: Record> {
    committed: Arc<RwLock<Committed<R>>>,
    next_tx_id: Arc<AtomicU64>,
}

impl<R: Record> Default for InMemoryDriver<R> {
    fn default() -> Self {
        Self {
            committed: Arc::new(RwLock::new(Committed {
                rows: HashMap::new(),
                versions: HashMap::new(),
            })),
            next_tx_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<R: Record> InMemoryDriver<R> {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a committed row.
    pub async fn get(&self, kind: R::Kind, key: &EntityKey) -> Option<R> {
        self.committed.read().await.rows.get(&(kind, key.clone())).cloned()
    }

    /// Returns the number of committed rows.
    pub async fn len(&self) -> usize {
        self.committed.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.committed.read().await.rows.is_empty()
    }

    /// Returns a copy of every committed row.
    pub async fn snapshot(&self) -> Table<R> {
        self.committed.read().await.rows.clone()
    }

    /// Inserts a committed row directly, bypassing transactions.
    pub async fn seed(&self, record: R) {
        self.committed
            .write()
            .await
            .apply((record.kind(), record.key()), Some(record));
    }
}

#[derive(Debug)]
struct StagedWrites<R: Record> {
    // `None` marks a staged delete.
    writes: HashMap<RowKey<R>, Option<R>>,
    // Committed version at the first read or write of each row.
    observed: HashMap<RowKey<R>, u64>,
    open: bool,
}

/// Handle to an open in-memory transaction.
#[derive(Clone)]
pub struct InMemoryTransaction<R: Record> {
    id: u64,
    committed: Arc<RwLock<Committed<R>>>,
    staged: Arc<Mutex<StagedWrites<R>>>,
}

impl<R: Record> InMemoryTransaction<R> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn is_open(&self) -> bool {
        self.staged.lock().await.open
    }

    async fn lookup(&self, row: &RowKey<R>) -> Result<Option<R>> {
        let mut staged = self.staged.lock().await;
        if !staged.open {
            return Err(StorageError::TransactionClosed.into());
        }
        if let Some(write) = staged.writes.get(row) {
            return Ok(write.clone());
        }
        let committed = self.committed.read().await;
        staged
            .observed
            .entry(row.clone())
            .or_insert_with(|| committed.version(row));
        Ok(committed.rows.get(row).cloned())
    }

    async fn stage(&self, row: RowKey<R>, write: Option<R>, must_exist: bool) -> Result<()> {
        let mut staged = self.staged.lock().await;
        if !staged.open {
            return Err(StorageError::TransactionClosed.into());
        }

        let staged_write = staged.writes.get(&row).map(Option::is_some);
        let exists = match staged_write {
            Some(present) => present,
            None => {
                let committed = self.committed.read().await;
                staged
                    .observed
                    .entry(row.clone())
                    .or_insert_with(|| committed.version(&row));
                committed.rows.contains_key(&row)
            }
        };

        let (kind, key) = &row;
        if must_exist && !exists {
            return Err(DomainError::not_found(kind.name(), key.clone()).into());
        }
        if !must_exist && exists {
            return Err(StorageError::DuplicateKey {
                kind: kind.name(),
                key: key.clone(),
            }
            .into());
        }

        staged.writes.insert(row, write);
        Ok(())
    }
}

#[async_trait]
impl<R: Record> StorageDriver for InMemoryDriver<R> {
    type Transaction = InMemoryTransaction<R>;

    async fn begin(&self) -> Result<Self::Transaction> {
        let id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(tx = id, "in-memory transaction opened");
        Ok(InMemoryTransaction {
            id,
            committed: Arc::clone(&self.committed),
            staged: Arc::new(Mutex::new(StagedWrites {
                writes: HashMap::new(),
                observed: HashMap::new(),
                open: true,
            })),
        })
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<()> {
        let mut staged = tx.staged.lock().await;
        if !staged.open {
            return Err(StorageError::TransactionClosed.into());
        }
        staged.open = false;

        let mut committed = self.committed.write().await;
        let conflict = staged.writes.keys().find(|row| {
            let seen = staged.observed.get(*row).copied().unwrap_or(0);
            committed.version(row) != seen
        });
        if let Some((kind, key)) = conflict {
            let error = StorageError::WriteConflict {
                kind: kind.name(),
                key: key.clone(),
            };
            staged.writes.clear();
            tracing::debug!(tx = tx.id, %error, "in-memory commit rejected");
            return Err(error.into());
        }

        let applied = staged.writes.len();
        for (row, write) in staged.writes.drain() {
            committed.apply(row, write);
        }
        tracing::trace!(tx = tx.id, applied, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<()> {
        let mut staged = tx.staged.lock().await;
        if !staged.open {
            return Err(StorageError::TransactionClosed.into());
        }
        staged.open = false;
        let discarded = staged.writes.len();
        staged.writes.clear();
        tracing::trace!(tx = tx.id, discarded, "in-memory transaction rolled back");
        Ok(())
    }
}

/// Repository over an [`InMemoryDriver`] table for a single kind.
#[derive(Clone)]
pub struct InMemoryRepository<R: Record> {
    kind: R::Kind,
    tx: InMemoryTransaction<R>,
}

impl<R: Record> InMemoryRepository<R> {
    pub fn new(kind: R::Kind, tx: InMemoryTransaction<R>) -> Self {
        Self { kind, tx }
    }

    fn row_for(&self, record: &R) -> Result<RowKey<R>> {
        if record.kind() != self.kind {
            return Err(StorageError::Backend(format!(
                "{} record passed to {} repository",
                record.kind(),
                self.kind
            ))
            .into());
        }
        Ok((self.kind, record.key()))
    }
}

#[async_trait]
impl<R: Record> Repository<R> for InMemoryRepository<R> {
    fn kind(&self) -> R::Kind {
        self.kind
    }

    async fn create(&self, record: &R) -> Result<()> {
        let row = self.row_for(record)?;
        self.tx.stage(row, Some(record.clone()), false).await
    }

    async fn update(&self, record: &R) -> Result<()> {
        let row = self.row_for(record)?;
        self.tx.stage(row, Some(record.clone()), true).await
    }

    async fn delete(&self, key: &EntityKey) -> Result<()> {
        self.tx.stage((self.kind, key.clone()), None, true).await
    }

    async fn find_by_id(&self, key: &EntityKey) -> Result<Option<R>> {
        self.tx.lookup(&(self.kind, key.clone())).await
    }
}
