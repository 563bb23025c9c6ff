//! Aggregate root trait.

use crate::changes::{ChangeAction, ChangedEntity, PendingChanges};
use crate::entity::Entity;
use crate::event::DomainEvent;
use crate::record::Record;

/// An entity that owns a consistency boundary.
///
/// Business logic mutates an aggregate purely in memory and describes the
/// side effects it requires through [`PendingChanges`]: domain events to
/// deliver and related entities to persist alongside the root. The unit of
/// work consumes those changes exactly once per successful save.
///
/// After a failed save the pending changes are left as they were and the
/// aggregate instance should be discarded.
pub trait AggregateRoot: Entity + Send + Sync {
    /// The application's record type.
    type Record: Record;

    /// Snapshot of the root as a persistable record.
    fn to_record(&self) -> Self::Record;

    fn pending_changes(&self) -> &PendingChanges<Self::Record>;

    fn pending_changes_mut(&mut self) -> &mut PendingChanges<Self::Record>;

    /// Queues an event for delivery on the next save.
    fn add_domain_event(&mut self, event: DomainEvent) {
        self.pending_changes_mut().record_event(event);
    }

    /// Queued events, oldest first.
    fn domain_events(&self) -> &[DomainEvent] {
        self.pending_changes().events()
    }

    fn clear_domain_events(&mut self) {
        self.pending_changes_mut().clear_events();
    }

    /// Marks a related entity for persistence. Returns false when the same
    /// entity was already tracked under the same action; the tracked record
    /// is then refreshed to `entity`.
    fn add_tracked_entity(&mut self, entity: impl Into<Self::Record>, action: ChangeAction) -> bool
    where
        Self: Sized,
    {
        self.pending_changes_mut().track(entity.into(), action)
    }

    /// Tracked entities in insertion order.
    fn tracked_entities(&self) -> &[ChangedEntity<Self::Record>] {
        self.pending_changes().tracked()
    }

    fn clear_tracked_entities(&mut self) {
        self.pending_changes_mut().clear_tracked();
    }

    /// The root will be inserted on the next save.
    fn mark_new(&mut self) {
        self.pending_changes_mut()
            .set_root_action(ChangeAction::Created);
    }

    /// The root will be deleted on the next save.
    fn mark_deleted(&mut self) {
        self.pending_changes_mut()
            .set_root_action(ChangeAction::Deleted);
    }

    fn root_action(&self) -> ChangeAction {
        self.pending_changes().root_action()
    }

    /// Consumes all pending changes, leaving the aggregate clean.
    fn take_changes(&mut self) -> PendingChanges<Self::Record> {
        self.pending_changes_mut().take()
    }
}
