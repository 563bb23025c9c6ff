//! Wiring of repositories, handlers and the transaction manager.

use domain::EntityKind;
use persistence::{
    InMemoryDriver, InMemoryRepository, PostgresDriver, PostgresJsonRepository,
    RepositoryFactory, Result, StorageDriver,
};
use sqlx::postgres::PgPoolOptions;
use unit_of_work::{DomainEventBus, TransactionManager, UnitOfWorkConfig};

use crate::config::Config;
use crate::handlers::{ReceiveStockOnDeliveryCompleted, ReserveStockOnSaleRecorded};
use crate::record::{BackofficeKind, BackofficeRecord};

pub type MemoryDriver = InMemoryDriver<BackofficeRecord>;
pub type Manager<D> = TransactionManager<D, BackofficeRecord>;

/// The bus with every back-office handler registered.
pub fn event_bus<D: StorageDriver>() -> DomainEventBus<D, BackofficeRecord> {
    let mut bus = DomainEventBus::new();
    bus.register(ReceiveStockOnDeliveryCompleted)
        .register(ReserveStockOnSaleRecorded);
    bus
}

pub fn in_memory_factory() -> Result<RepositoryFactory<MemoryDriver, BackofficeRecord>> {
    let mut factory = RepositoryFactory::new();
    for &kind in BackofficeKind::all() {
        factory.register(kind, move |tx| InMemoryRepository::new(kind, tx))?;
    }
    Ok(factory)
}

pub fn postgres_factory() -> Result<RepositoryFactory<PostgresDriver, BackofficeRecord>> {
    let mut factory = RepositoryFactory::new();
    for &kind in BackofficeKind::all() {
        factory.register(kind, move |tx| PostgresJsonRepository::new(kind, tx))?;
    }
    Ok(factory)
}

/// An in-memory back office. The returned driver shares the manager's store.
pub fn in_memory(config: UnitOfWorkConfig) -> Result<(MemoryDriver, Manager<MemoryDriver>)> {
    let driver = MemoryDriver::new();
    let manager = TransactionManager::new(driver.clone(), in_memory_factory()?, event_bus(), config)?;
    Ok((driver, manager))
}

/// A PostgreSQL back office. The `entities` table must already exist.
pub async fn postgres(database_url: &str, config: UnitOfWorkConfig) -> Result<Manager<PostgresDriver>> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    TransactionManager::new(PostgresDriver::new(pool), postgres_factory()?, event_bus(), config)
}

/// Opens a transaction, resolves a repository for every kind and rolls back.
#[tracing::instrument(skip_all)]
pub async fn smoke_test<D: StorageDriver>(manager: &Manager<D>) -> Result<()> {
    let mut uow = manager.unit_of_work();
    uow.begin().await?;
    for &kind in BackofficeKind::all() {
        if let Err(error) = uow.repository(kind) {
            uow.rollback().await?;
            return Err(error);
        }
    }
    uow.rollback().await?;
    tracing::info!(kinds = BackofficeKind::all().len(), "smoke test passed");
    Ok(())
}

/// The configured storage backend.
pub enum Backend {
    InMemory(Manager<MemoryDriver>),
    Postgres(Manager<PostgresDriver>),
}

impl Backend {
    /// PostgreSQL when `DATABASE_URL` is set, in-memory otherwise.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match &config.database_url {
            Some(url) => Ok(Backend::Postgres(
                postgres(url, config.unit_of_work.clone()).await?,
            )),
            None => {
                let (_, manager) = in_memory(config.unit_of_work.clone())?;
                Ok(Backend::InMemory(manager))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::InMemory(_) => "in-memory",
            Backend::Postgres(_) => "postgres",
        }
    }

    pub async fn smoke_test(&self) -> Result<()> {
        match self {
            Backend::InMemory(manager) => smoke_test(manager).await,
            Backend::Postgres(manager) => smoke_test(manager).await,
        }
    }
}
