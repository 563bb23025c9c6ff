//! Domain model for the persistence core.
//!
//! This crate provides the pure, in-memory building blocks:
//! - [`Entity`] and [`AggregateRoot`] identity and change-tracking traits
//! - [`DomainEvent`], the immutable record queued on an aggregate
//! - [`PendingChanges`], the explicit set of events and tracked entities
//!   consumed by a save
//! - [`EntityKind`] and [`Record`], the closed set of persistable types

pub mod aggregate;
pub mod changes;
pub mod entity;
pub mod error;
pub mod event;
pub mod record;

pub use aggregate::AggregateRoot;
pub use changes::{ChangeAction, ChangedEntity, PendingChanges};
pub use common::{CompositeId, EntityId, EntityKey, Identity};
pub use entity::Entity;
pub use error::{DomainError, Result};
pub use event::DomainEvent;
pub use record::{EntityKind, Record};
