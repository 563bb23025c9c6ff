//! Shared fixtures: a journaling repository, a generic aggregate and a few
//! scripted handlers.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::EntityKey;
use domain::{
    AggregateRoot, ChangeAction, DomainError, DomainEvent, Entity, EntityKind, PendingChanges,
    Record,
};
use persistence::{InMemoryDriver, InMemoryRepository, Repository, RepositoryFactory};
use unit_of_work::{
    DomainEventBus, DomainEventHandler, Result, TransactionManager, UnitOfWork, UnitOfWorkConfig,
};

/// Ordered log of repository calls and handler invocations.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Account,
    Delivery,
    DeliveryItem,
    Product,
}

impl EntityKind for Kind {
    fn all() -> &'static [Self] {
        &[Kind::Account, Kind::Delivery, Kind::DeliveryItem, Kind::Product]
    }

    fn name(&self) -> &'static str {
        match self {
            Kind::Account => "Account",
            Kind::Delivery => "Delivery",
            Kind::DeliveryItem => "DeliveryItem",
            Kind::Product => "Product",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rec {
    pub kind: Kind,
    pub key: String,
}

impl Rec {
    pub fn new(kind: Kind, key: &str) -> Self {
        Self {
            kind,
            key: key.to_string(),
        }
    }
}

impl Record for Rec {
    type Kind = Kind;

    fn kind(&self) -> Kind {
        self.kind
    }

    fn key(&self) -> EntityKey {
        EntityKey::from(self.key.as_str())
    }
}

pub type Driver = InMemoryDriver<Rec>;
pub type Uow = UnitOfWork<Driver, Rec>;
pub type Bus = DomainEventBus<Driver, Rec>;

/// Logs every call before delegating to the in-memory repository.
pub struct JournalingRepository {
    inner: InMemoryRepository<Rec>,
    journal: Journal,
}

#[async_trait]
impl Repository<Rec> for JournalingRepository {
    fn kind(&self) -> Kind {
        self.inner.kind()
    }

    async fn create(&self, record: &Rec) -> Result<()> {
        self.journal
            .push(format!("create {}({})", record.kind, record.key));
        self.inner.create(record).await
    }

    async fn update(&self, record: &Rec) -> Result<()> {
        self.journal
            .push(format!("update {}({})", record.kind, record.key));
        self.inner.update(record).await
    }

    async fn delete(&self, key: &EntityKey) -> Result<()> {
        self.journal.push(format!("delete {}({})", self.kind(), key));
        self.inner.delete(key).await
    }

    async fn find_by_id(&self, key: &EntityKey) -> Result<Option<Rec>> {
        self.inner.find_by_id(key).await
    }
}

/// Aggregate of any kind, driven entirely by the test.
pub struct Node {
    kind: Kind,
    id: String,
    changes: PendingChanges<Rec>,
}

impl Node {
    /// An existing aggregate: the root is updated on save.
    pub fn existing(kind: Kind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
            changes: PendingChanges::new(),
        }
    }

    /// A new aggregate: the root is created on save.
    pub fn created(kind: Kind, id: &str) -> Self {
        let mut node = Self::existing(kind, id);
        node.mark_new();
        node
    }

    pub fn emit(mut self, event_name: &str) -> Self {
        self.add_domain_event(DomainEvent::new(event_name, serde_json::Value::Null));
        self
    }

    pub fn track(mut self, kind: Kind, key: &str, action: ChangeAction) -> Self {
        self.add_tracked_entity(Rec::new(kind, key), action);
        self
    }
}

impl Entity for Node {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl AggregateRoot for Node {
    type Record = Rec;

    fn to_record(&self) -> Rec {
        Rec::new(self.kind, &self.id)
    }

    fn pending_changes(&self) -> &PendingChanges<Rec> {
        &self.changes
    }

    fn pending_changes_mut(&mut self) -> &mut PendingChanges<Rec> {
        &mut self.changes
    }
}

/// Logs `handle <label>` for each delivered event.
pub struct Recorder {
    pub event: &'static str,
    pub label: &'static str,
    pub journal: Journal,
}

#[async_trait]
impl DomainEventHandler<Driver, Rec> for Recorder {
    fn event_name(&self) -> &str {
        self.event
    }

    async fn handle(&self, _event: &DomainEvent, _uow: &mut Uow) -> Result<()> {
        self.journal.push(format!("handle {}", self.label));
        Ok(())
    }
}

/// Logs `fail <event>` and returns a conflict.
pub struct Failing {
    pub event: &'static str,
    pub journal: Journal,
}

#[async_trait]
impl DomainEventHandler<Driver, Rec> for Failing {
    fn event_name(&self) -> &str {
        self.event
    }

    async fn handle(&self, event: &DomainEvent, _uow: &mut Uow) -> Result<()> {
        self.journal.push(format!("fail {}", event.event_name()));
        Err(DomainError::conflict(format!("{} rejected", event.event_name())).into())
    }
}

/// Saves a new aggregate, which may carry events of its own.
pub struct SaveOther {
    pub event: &'static str,
    pub kind: Kind,
    pub key: &'static str,
    pub emits: Vec<&'static str>,
}

#[async_trait]
impl DomainEventHandler<Driver, Rec> for SaveOther {
    fn event_name(&self) -> &str {
        self.event
    }

    async fn handle(&self, _event: &DomainEvent, uow: &mut Uow) -> Result<()> {
        let mut other = Node::created(self.kind, self.key);
        for name in &self.emits {
            other = other.emit(name);
        }
        uow.save(&mut other).await
    }
}

/// Saves a fresh product emitting the same event again, forever.
pub struct Runaway {
    pub event: &'static str,
}

#[async_trait]
impl DomainEventHandler<Driver, Rec> for Runaway {
    fn event_name(&self) -> &str {
        self.event
    }

    async fn handle(&self, _event: &DomainEvent, uow: &mut Uow) -> Result<()> {
        let key = format!("p{}", uow.cascade().len());
        let mut next = Node::created(Kind::Product, &key).emit(self.event);
        uow.save(&mut next).await
    }
}

/// Tries to commit from inside a save.
pub struct CommitInside {
    pub event: &'static str,
}

#[async_trait]
impl DomainEventHandler<Driver, Rec> for CommitInside {
    fn event_name(&self) -> &str {
        self.event
    }

    async fn handle(&self, _event: &DomainEvent, uow: &mut Uow) -> Result<()> {
        uow.commit().await
    }
}

pub fn journaling_factory(journal: &Journal) -> RepositoryFactory<Driver, Rec> {
    let mut factory = RepositoryFactory::new();
    for kind in Kind::all() {
        let kind = *kind;
        let journal = journal.clone();
        factory
            .register(kind, move |tx| JournalingRepository {
                inner: InMemoryRepository::new(kind, tx),
                journal: journal.clone(),
            })
            .unwrap();
    }
    factory
}

pub struct Harness {
    pub driver: Driver,
    pub journal: Journal,
    pub manager: TransactionManager<Driver, Rec>,
}

impl Harness {
    pub fn unit_of_work(&self) -> Uow {
        self.manager.unit_of_work()
    }
}

pub fn harness(configure: impl FnOnce(&mut Bus, &Journal)) -> Harness {
    harness_with(UnitOfWorkConfig::default(), configure)
}

pub fn harness_with(config: UnitOfWorkConfig, configure: impl FnOnce(&mut Bus, &Journal)) -> Harness {
    let journal = Journal::default();
    let driver = Driver::new();
    let mut bus = Bus::new();
    configure(&mut bus, &journal);

    let manager =
        TransactionManager::new(driver.clone(), journaling_factory(&journal), bus, config).unwrap();

    Harness {
        driver,
        journal,
        manager,
    }
}
