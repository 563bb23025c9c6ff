//! PostgreSQL storage driver.
//!
//! Records are stored as JSON documents in a single table:
//!
//! ```sql
//! CREATE TABLE entities (
//!     kind       TEXT        NOT NULL,
//!     key        TEXT        NOT NULL,
//!     body       JSONB       NOT NULL,
//!     version    BIGINT      NOT NULL DEFAULT 1,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (kind, key)
//! );
//! ```
//!
//! Creating and migrating the table is the deployment's responsibility.
//!
//! Writes are guarded by the `version` column. The first time a transaction
//! reads or writes a row it remembers the row's version, and later updates
//! and deletes only match that version. A row changed by another transaction
//! in between fails with [`StorageError::WriteConflict`] instead of being
//! silently overwritten.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use common::EntityKey;
use domain::{DomainError, EntityKind, Record};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{PgPool, Postgres, Row};
use tokio::sync::Mutex;

use crate::driver::StorageDriver;
use crate::error::{Result, StorageError};
use crate::repository::Repository;

/// PostgreSQL-backed storage driver.
#[derive(Clone)]
pub struct PostgresDriver {
    pool: PgPool,
}

impl PostgresDriver {
    /// Creates a new driver over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

type VersionKey = (&'static str, EntityKey);

/// Shared handle to one open PostgreSQL transaction.
///
/// All clones use the same connection; statements are serialized through a
/// mutex. When the last clone is dropped without commit, sqlx rolls the
/// transaction back.
#[derive(Clone)]
pub struct PgTransaction {
    inner: Arc<Mutex<Option<sqlx::Transaction<'static, Postgres>>>>,
    versions: Arc<Mutex<HashMap<VersionKey, i64>>>,
}

impl PgTransaction {
    async fn take(&self) -> Result<sqlx::Transaction<'static, Postgres>> {
        self.inner
            .lock()
            .await
            .take()
            .ok_or_else(|| StorageError::TransactionClosed.into())
    }

    async fn expected_version(&self, kind: &'static str, key: &EntityKey) -> Option<i64> {
        self.versions.lock().await.get(&(kind, key.clone())).copied()
    }

    /// Remembers the first version seen for a row.
    async fn observe(&self, kind: &'static str, key: &EntityKey, version: i64) {
        self.versions
            .lock()
            .await
            .entry((kind, key.clone()))
            .or_insert(version);
    }

    /// Records the version this transaction itself just wrote.
    async fn wrote(&self, kind: &'static str, key: &EntityKey, version: Option<i64>) {
        let mut versions = self.versions.lock().await;
        match version {
            Some(version) => {
                versions.insert((kind, key.clone()), version);
            }
            None => {
                versions.remove(&(kind, key.clone()));
            }
        }
    }
}

#[async_trait]
impl StorageDriver for PostgresDriver {
    type Transaction = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction {
            inner: Arc::new(Mutex::new(Some(tx))),
            versions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    async fn commit(&self, tx: PgTransaction) -> Result<()> {
        tx.take().await?.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: PgTransaction) -> Result<()> {
        tx.take().await?.rollback().await?;
        Ok(())
    }
}

/// Stores one kind of record as JSONB rows in the `entities` table.
pub struct PostgresJsonRepository<R: Record> {
    kind: R::Kind,
    tx: PgTransaction,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> PostgresJsonRepository<R> {
    pub fn new(kind: R::Kind, tx: PgTransaction) -> Self {
        Self {
            kind,
            tx,
            _record: PhantomData,
        }
    }

    fn check_kind(&self, record: &R) -> Result<()> {
        if record.kind() != self.kind {
            return Err(StorageError::Backend(format!(
                "{} record passed to {} repository",
                record.kind(),
                self.kind
            ))
            .into());
        }
        Ok(())
    }

    fn not_found(&self, key: &EntityKey) -> crate::Error {
        DomainError::not_found(self.kind.name(), key.clone()).into()
    }

    fn conflict(&self, key: &EntityKey) -> crate::Error {
        StorageError::WriteConflict {
            kind: self.kind.name(),
            key: key.clone(),
        }
        .into()
    }

    /// A row this transaction had seen can only be missed because another
    /// transaction changed or removed it.
    fn missed_write(&self, key: &EntityKey, expected: Option<i64>) -> crate::Error {
        match expected {
            Some(_) => self.conflict(key),
            None => self.not_found(key),
        }
    }
}

#[async_trait]
impl<R> Repository<R> for PostgresJsonRepository<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    fn kind(&self) -> R::Kind {
        self.kind
    }

    async fn create(&self, record: &R) -> Result<()> {
        self.check_kind(record)?;
        let key = record.key();
        let body = serde_json::to_value(record)?;

        let mut guard = self.tx.inner.lock().await;
        let conn = guard.as_mut().ok_or(StorageError::TransactionClosed)?;

        sqlx::query("INSERT INTO entities (kind, key, body, version) VALUES ($1, $2, $3, 1)")
            .bind(self.kind.name())
            .bind(key.as_str())
            .bind(body)
            .execute(&mut **conn)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StorageError::DuplicateKey {
                        kind: self.kind.name(),
                        key: key.clone(),
                    };
                }
                StorageError::Database(e)
            })?;
        drop(guard);

        self.tx.wrote(self.kind.name(), &key, Some(1)).await;
        Ok(())
    }

    async fn update(&self, record: &R) -> Result<()> {
        self.check_kind(record)?;
        let key = record.key();
        let body = serde_json::to_value(record)?;
        let expected = self.tx.expected_version(self.kind.name(), &key).await;

        let mut guard = self.tx.inner.lock().await;
        let conn = guard.as_mut().ok_or(StorageError::TransactionClosed)?;

        // A NULL expected version matches any row the transaction never saw.
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE entities
            SET body = $3, version = version + 1, updated_at = NOW()
            WHERE kind = $1 AND key = $2 AND ($4::BIGINT IS NULL OR version = $4)
            RETURNING version
            "#,
        )
        .bind(self.kind.name())
        .bind(key.as_str())
        .bind(body)
        .bind(expected)
        .fetch_optional(&mut **conn)
        .await?;

        let Some(version) = version else {
            return Err(self.missed_write(&key, expected));
        };
        drop(guard);

        self.tx.wrote(self.kind.name(), &key, Some(version)).await;
        Ok(())
    }

    async fn delete(&self, key: &EntityKey) -> Result<()> {
        let expected = self.tx.expected_version(self.kind.name(), key).await;

        let mut guard = self.tx.inner.lock().await;
        let conn = guard.as_mut().ok_or(StorageError::TransactionClosed)?;

        let result = sqlx::query(
            "DELETE FROM entities WHERE kind = $1 AND key = $2 AND ($3::BIGINT IS NULL OR version = $3)",
        )
        .bind(self.kind.name())
        .bind(key.as_str())
        .bind(expected)
        .execute(&mut **conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missed_write(key, expected));
        }
        drop(guard);

        self.tx.wrote(self.kind.name(), key, None).await;
        Ok(())
    }

    async fn find_by_id(&self, key: &EntityKey) -> Result<Option<R>> {
        let mut guard = self.tx.inner.lock().await;
        let conn = guard.as_mut().ok_or(StorageError::TransactionClosed)?;

        let row = sqlx::query("SELECT body, version FROM entities WHERE kind = $1 AND key = $2")
            .bind(self.kind.name())
            .bind(key.as_str())
            .fetch_optional(&mut **conn)
            .await?;
        drop(guard);

        match row {
            Some(row) => {
                let body: serde_json::Value = row.try_get("body")?;
                let version: i64 = row.try_get("version")?;
                self.tx.observe(self.kind.name(), key, version).await;
                Ok(Some(serde_json::from_value(body)?))
            }
            None => Ok(None),
        }
    }
}
