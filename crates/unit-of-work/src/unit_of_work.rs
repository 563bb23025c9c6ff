//! The unit of work: one transaction, its repositories and cascading saves.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use common::EntityKey;
use domain::{AggregateRoot, ChangeAction, EntityKind, Record};
use persistence::{ConfigurationError, Repository, RepositoryFactory, Result, StorageDriver};
use tracing::Instrument;

use crate::bus::DomainEventBus;
use crate::config::UnitOfWorkConfig;

/// Lifecycle of the transaction owned by a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// `begin` has not been called yet.
    Idle,
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Idle => write!(f, "Idle"),
            TransactionState::Active => write!(f, "Active"),
            TransactionState::Committed => write!(f, "Committed"),
            TransactionState::RolledBack => write!(f, "RolledBack"),
        }
    }
}

/// One aggregate save on the cascade stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeFrame {
    pub kind: &'static str,
    pub key: EntityKey,
}

impl fmt::Display for CascadeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.key)
    }
}

/// Coordinates one physical transaction.
///
/// A unit of work is created per business operation and goes through
/// `begin` → any number of `save` calls → `commit` or `rollback`. It binds
/// exactly one transaction: once that transaction has finished the instance
/// cannot be reused.
///
/// Repositories are built lazily through the [`RepositoryFactory`], bound to
/// the open transaction and cached for the lifetime of the instance.
///
/// `save` does not roll back on failure. The caller owns the transaction and
/// decides; [`TransactionManager::run`] does it for the common case.
///
/// [`TransactionManager::run`]: crate::TransactionManager::run
pub struct UnitOfWork<D: StorageDriver, R: Record> {
    driver: Arc<D>,
    factory: Arc<RepositoryFactory<D, R>>,
    bus: Arc<DomainEventBus<D, R>>,
    config: UnitOfWorkConfig,
    tx: Option<D::Transaction>,
    state: TransactionState,
    repositories: HashMap<R::Kind, Arc<dyn Repository<R>>>,
    cascade: Vec<CascadeFrame>,
}

impl<D: StorageDriver, R: Record> UnitOfWork<D, R> {
    pub fn new(
        driver: Arc<D>,
        factory: Arc<RepositoryFactory<D, R>>,
        bus: Arc<DomainEventBus<D, R>>,
        config: UnitOfWorkConfig,
    ) -> Self {
        Self {
            driver,
            factory,
            bus,
            config,
            tx: None,
            state: TransactionState::Idle,
            repositories: HashMap::new(),
            cascade: Vec::new(),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true while the transaction is open.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Saves currently in progress, outermost first.
    pub fn cascade(&self) -> &[CascadeFrame] {
        &self.cascade
    }

    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    /// Opens the transaction.
    pub async fn begin(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Idle => {}
            TransactionState::Active => return Err(ConfigurationError::TransactionAlreadyOpen.into()),
            TransactionState::Committed | TransactionState::RolledBack => {
                return Err(ConfigurationError::TransactionFinished.into());
            }
        }

        let tx = self.driver.begin().await?;
        self.tx = Some(tx);
        self.state = TransactionState::Active;
        tracing::debug!("transaction opened");
        Ok(())
    }

    /// Returns the repository for `kind`, bound to the open transaction.
    ///
    /// The first call per kind builds the repository; later calls return the
    /// same instance.
    pub fn repository(&mut self, kind: R::Kind) -> Result<Arc<dyn Repository<R>>> {
        if let Some(repository) = self.repositories.get(&kind) {
            return Ok(Arc::clone(repository));
        }

        let tx = self
            .tx
            .clone()
            .ok_or(ConfigurationError::NoOpenTransaction)?;
        let repository = self.factory.repository_for(kind, tx)?;
        self.repositories.insert(kind, Arc::clone(&repository));
        Ok(repository)
    }

    /// Persists an aggregate and delivers its events in this transaction.
    ///
    /// In order:
    /// 1. every tracked entity is written with its recorded action, in
    ///    tracking order;
    /// 2. the root is written with its own action;
    /// 3. queued events are dispatched, oldest first, with this unit of work
    ///    handed to each handler.
    ///
    /// On success the aggregate's events and tracked entities are cleared
    /// and its root action goes back to `Updated`. On failure the error is
    /// returned unchanged and the aggregate is left as it was.
    pub async fn save<A>(&mut self, aggregate: &mut A) -> Result<()>
    where
        A: AggregateRoot<Record = R>,
    {
        if !self.is_active() {
            return Err(ConfigurationError::NoOpenTransaction.into());
        }

        let root = aggregate.to_record();
        let frame = CascadeFrame {
            kind: root.kind().name(),
            key: root.key(),
        };

        if self.cascade.len() >= self.config.max_cascade_depth {
            let mut path: Vec<String> = self.cascade.iter().map(ToString::to_string).collect();
            path.push(frame.to_string());
            tracing::error!(
                max = self.config.max_cascade_depth,
                path = %path.join(" -> "),
                "cascade depth exceeded"
            );
            return Err(ConfigurationError::CascadeDepthExceeded {
                max: self.config.max_cascade_depth,
                path,
            }
            .into());
        }

        let span = tracing::debug_span!(
            "save",
            kind = frame.kind,
            key = %frame.key,
            depth = self.cascade.len()
        );
        self.cascade.push(frame);

        let started = Instant::now();
        let result = self.cascade_save(&*aggregate, root).instrument(span).await;
        self.cascade.pop();

        metrics::counter!("uow_saves_total").increment(1);
        metrics::histogram!("uow_save_duration_seconds").record(started.elapsed().as_secs_f64());

        result?;

        let changes = aggregate.pending_changes_mut();
        changes.clear_events();
        changes.clear_tracked();
        changes.set_root_action(ChangeAction::Updated);
        Ok(())
    }

    async fn cascade_save<A>(&mut self, aggregate: &A, root: R) -> Result<()>
    where
        A: AggregateRoot<Record = R>,
    {
        for changed in aggregate.tracked_entities() {
            self.persist(&changed.entity, changed.action).await?;
        }
        self.persist(&root, aggregate.root_action()).await?;

        let bus = Arc::clone(&self.bus);
        bus.dispatch(aggregate, self).await
    }

    async fn persist(&mut self, record: &R, action: ChangeAction) -> Result<()> {
        let repository = self.repository(record.kind())?;
        tracing::debug!(kind = %record.kind(), key = %record.key(), %action, "writing record");

        match action {
            ChangeAction::Created => repository.create(record).await?,
            ChangeAction::Updated => repository.update(record).await?,
            ChangeAction::Deleted => repository.delete(&record.key()).await?,
        }

        metrics::counter!("uow_repository_writes_total", "action" => action.as_str()).increment(1);
        Ok(())
    }

    /// Commits the transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_not_cascading("commit")?;
        let tx = self.tx.take().ok_or(ConfigurationError::NoOpenTransaction)?;
        self.repositories.clear();

        if let Err(error) = self.driver.commit(tx).await {
            // The handle is consumed either way.
            self.state = TransactionState::RolledBack;
            tracing::warn!(%error, "commit failed");
            return Err(error);
        }

        self.state = TransactionState::Committed;
        metrics::counter!("uow_commits_total").increment(1);
        tracing::info!("transaction committed");
        Ok(())
    }

    /// Rolls the transaction back. Does nothing when no transaction is open.
    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_not_cascading("rollback")?;
        let Some(tx) = self.tx.take() else {
            tracing::debug!(state = %self.state, "rollback without open transaction ignored");
            return Ok(());
        };
        self.repositories.clear();
        self.state = TransactionState::RolledBack;

        self.driver.rollback(tx).await?;
        metrics::counter!("uow_rollbacks_total").increment(1);
        tracing::info!("transaction rolled back");
        Ok(())
    }

    fn ensure_not_cascading(&self, operation: &'static str) -> Result<()> {
        if self.cascade.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::CascadeInProgress { operation }.into())
        }
    }

    /// Forgets saves that were interrupted without unwinding, such as a
    /// save future dropped on timeout.
    pub(crate) fn reset_cascade(&mut self) {
        if !self.cascade.is_empty() {
            tracing::debug!(frames = self.cascade.len(), "discarding interrupted cascade");
            self.cascade.clear();
        }
    }
}

impl<D: StorageDriver, R: Record> Drop for UnitOfWork<D, R> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!("unit of work dropped with an open transaction, discarding its writes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Kind, Part, Widget, unit_of_work};
    use persistence::{Error, RepositoryExt};

    #[tokio::test]
    async fn begin_twice_is_rejected() {
        let (_driver, mut uow) = unit_of_work();
        uow.begin().await.unwrap();

        let result = uow.begin().await;
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::TransactionAlreadyOpen))
        ));
    }

    #[tokio::test]
    async fn finished_unit_of_work_cannot_begin_again() {
        let (_driver, mut uow) = unit_of_work();
        uow.begin().await.unwrap();
        uow.commit().await.unwrap();

        let result = uow.begin().await;
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::TransactionFinished))
        ));
        assert_eq!(uow.state(), TransactionState::Committed);
    }

    #[tokio::test]
    async fn commit_without_begin_is_rejected() {
        let (_driver, mut uow) = unit_of_work();
        let result = uow.commit().await;
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::NoOpenTransaction))
        ));
    }

    #[tokio::test]
    async fn rollback_is_idempotent() {
        let (_driver, mut uow) = unit_of_work();
        uow.rollback().await.unwrap();

        uow.begin().await.unwrap();
        uow.rollback().await.unwrap();
        uow.rollback().await.unwrap();
        assert_eq!(uow.state(), TransactionState::RolledBack);
    }

    #[tokio::test]
    async fn repositories_are_cached_per_kind() {
        let (_driver, mut uow) = unit_of_work();
        assert!(uow.repository(Kind::Widget).is_err());

        uow.begin().await.unwrap();
        let first = uow.repository(Kind::Widget).unwrap();
        let second = uow.repository(Kind::Widget).unwrap();
        let other = uow.repository(Kind::Part).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn save_without_transaction_is_rejected() {
        let (_driver, mut uow) = unit_of_work();
        let mut widget = Widget::new("w1");

        let result = uow.save(&mut widget).await;
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::NoOpenTransaction))
        ));
    }

    #[tokio::test]
    async fn save_writes_parts_then_root_and_clears_changes() {
        let (driver, mut uow) = unit_of_work();
        let mut widget = Widget::new("w1");
        widget.mark_new();
        widget.attach(Part::new("w1", 1));
        widget.attach(Part::new("w1", 2));

        uow.begin().await.unwrap();
        uow.save(&mut widget).await.unwrap();

        assert!(widget.tracked_entities().is_empty());
        assert!(widget.domain_events().is_empty());
        assert_eq!(widget.root_action(), ChangeAction::Updated);

        let repo = uow.repository(Kind::Widget).unwrap();
        assert!(repo.exists(&EntityKey::from("w1")).await.unwrap());
        assert!(driver.is_empty().await);

        uow.commit().await.unwrap();
        assert_eq!(driver.len().await, 3);
    }

    #[tokio::test]
    async fn failed_save_keeps_pending_changes() {
        let (_driver, mut uow) = unit_of_work();
        // Updating a widget that was never created fails in the repository.
        let mut widget = Widget::new("w1");
        widget.attach(Part::new("w1", 1));

        uow.begin().await.unwrap();
        let result = uow.save(&mut widget).await;
        assert!(result.is_err());
        assert_eq!(widget.tracked_entities().len(), 1);
        assert!(uow.cascade().is_empty());
    }

    #[tokio::test]
    async fn dropping_an_open_unit_of_work_discards_writes() {
        let (driver, mut uow) = unit_of_work();
        let mut widget = Widget::new("w1");
        widget.mark_new();

        uow.begin().await.unwrap();
        uow.save(&mut widget).await.unwrap();
        drop(uow);

        assert!(driver.is_empty().await);
    }
}
