//! Begin → work → commit / rollback driver.

use std::sync::Arc;

use domain::Record;
use futures_util::future::BoxFuture;
use persistence::{Error, RepositoryFactory, Result, StorageDriver};

use crate::bus::DomainEventBus;
use crate::config::UnitOfWorkConfig;
use crate::unit_of_work::UnitOfWork;

/// Entry point of the calling layer.
///
/// Holds the driver, the repository factory and the event bus, all shared
/// across operations, and hands out one [`UnitOfWork`] per operation.
pub struct TransactionManager<D: StorageDriver, R: Record> {
    driver: Arc<D>,
    factory: Arc<RepositoryFactory<D, R>>,
    bus: Arc<DomainEventBus<D, R>>,
    config: UnitOfWorkConfig,
}

impl<D: StorageDriver, R: Record> Clone for TransactionManager<D, R> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            factory: Arc::clone(&self.factory),
            bus: Arc::clone(&self.bus),
            config: self.config.clone(),
        }
    }
}

impl<D: StorageDriver, R: Record> TransactionManager<D, R> {
    /// Creates a manager after checking that every kind has a repository.
    pub fn new(
        driver: D,
        factory: RepositoryFactory<D, R>,
        bus: DomainEventBus<D, R>,
        config: UnitOfWorkConfig,
    ) -> Result<Self> {
        factory.verify_complete()?;
        tracing::info!(
            kinds = factory.registered_kinds().len(),
            max_cascade_depth = config.max_cascade_depth,
            "transaction manager ready"
        );
        Ok(Self {
            driver: Arc::new(driver),
            factory: Arc::new(factory),
            bus: Arc::new(bus),
            config,
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    /// A fresh, not yet begun unit of work.
    pub fn unit_of_work(&self) -> UnitOfWork<D, R> {
        UnitOfWork::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.factory),
            Arc::clone(&self.bus),
            self.config.clone(),
        )
    }

    /// Runs `work` inside a new transaction.
    ///
    /// Commits when `work` succeeds and rolls back when it fails. With a
    /// configured `transaction_timeout`, `work` is cancelled once the
    /// deadline passes, the transaction is rolled back and
    /// [`Error::Timeout`] is returned.
    ///
    /// `work` must not commit or roll back itself. Values it needs are moved
    /// into the returned future:
    ///
    /// ```ignore
    /// let account = manager
    ///     .run(move |uow| Box::pin(async move {
    ///         let mut account = account;
    ///         uow.save(&mut account).await?;
    ///         Ok(account)
    ///     }))
    ///     .await?;
    /// ```
    #[tracing::instrument(skip_all)]
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut UnitOfWork<D, R>) -> BoxFuture<'a, Result<T>> + Send,
    {
        let mut uow = self.unit_of_work();
        uow.begin().await?;

        let outcome = match self.config.transaction_timeout {
            Some(limit) => {
                let result = tokio::time::timeout(limit, work(&mut uow)).await;
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(timeout = ?limit, "transaction timed out");
                        uow.reset_cascade();
                        Err(Error::Timeout(limit))
                    }
                }
            }
            None => work(&mut uow).await,
        };

        match outcome {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(error) => {
                tracing::debug!(%error, "operation failed, rolling back");
                if let Err(rollback_error) = uow.rollback().await {
                    tracing::error!(%rollback_error, original = %error, "rollback failed");
                }
                Err(error)
            }
        }
    }
}
