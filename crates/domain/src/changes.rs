//! Pending changes carried by an aggregate until it is saved.

use std::collections::HashMap;

use common::EntityKey;
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;
use crate::record::Record;

/// What the persistence layer must do with a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChangeAction {
    Created,
    #[default]
    Updated,
    Deleted,
}

impl ChangeAction {
    /// Returns the action name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Created => "created",
            ChangeAction::Updated => "updated",
            ChangeAction::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked entity and the action recorded for it.
#[derive(Debug, Clone)]
pub struct ChangedEntity<R> {
    pub entity: R,
    pub action: ChangeAction,
}

/// Events and tracked entities accumulated by business logic.
///
/// Events are kept in append order. Tracked entities are kept in insertion
/// order and deduplicated on `(kind, key, action)`: tracking the same entity
/// twice under one action replaces the stored record in place, keeping its
/// original position, while a different action adds a second independent
/// entry.
#[derive(Debug, Clone)]
pub struct PendingChanges<R: Record> {
    events: Vec<DomainEvent>,
    tracked: Vec<ChangedEntity<R>>,
    // Position of each tracked entry in `tracked`.
    seen: HashMap<(R::Kind, EntityKey, ChangeAction), usize>,
    root_action: ChangeAction,
}

impl<R: Record> Default for PendingChanges<R> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            tracked: Vec::new(),
            seen: HashMap::new(),
            root_action: ChangeAction::Updated,
        }
    }
}

impl<R: Record> PendingChanges<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the log.
    pub fn record_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Tracks an entity. Returns false if the same `(kind, key, action)` was
    /// already tracked, in which case the stored record is replaced by
    /// `entity` so the latest state is the one persisted.
    pub fn track(&mut self, entity: R, action: ChangeAction) -> bool {
        let id = (entity.kind(), entity.key(), action);
        if let Some(&index) = self.seen.get(&id) {
            self.tracked[index].entity = entity;
            return false;
        }
        self.seen.insert(id, self.tracked.len());
        self.tracked.push(ChangedEntity { entity, action });
        true
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn tracked(&self) -> &[ChangedEntity<R>] {
        &self.tracked
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn clear_tracked(&mut self) {
        self.tracked.clear();
        self.seen.clear();
    }

    /// How the aggregate root itself will be persisted.
    pub fn root_action(&self) -> ChangeAction {
        self.root_action
    }

    pub fn set_root_action(&mut self, action: ChangeAction) {
        self.root_action = action;
    }

    /// Returns true if there is nothing to persist besides the root.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.tracked.is_empty()
    }

    /// Consumes the pending changes, leaving an empty set behind.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::record::EntityKind;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Kind {
        Parent,
        Child,
    }

    impl EntityKind for Kind {
        fn all() -> &'static [Self] {
            &[Kind::Parent, Kind::Child]
        }

        fn name(&self) -> &'static str {
            match self {
                Kind::Parent => "Parent",
                Kind::Child => "Child",
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
        pub key: &'static str,
        pub revision: u32,
    }

    impl Record for Rec {
        type Kind = Kind;

        fn kind(&self) -> Kind {
            self.kind
        }

        fn key(&self) -> EntityKey {
            EntityKey::from(self.key)
        }
    }

    pub fn child(key: &'static str) -> Rec {
        child_at(key, 0)
    }

    pub fn child_at(key: &'static str, revision: u32) -> Rec {
        Rec {
            kind: Kind::Child,
            key,
            revision,
        }
    }
}
