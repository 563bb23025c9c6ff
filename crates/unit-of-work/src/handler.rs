use async_trait::async_trait;
use domain::{DomainEvent, Record};
use persistence::{Result, StorageDriver};

use crate::unit_of_work::UnitOfWork;

/// Reacts to one named domain event inside the triggering transaction.
///
/// Handlers receive the same unit of work that is saving the aggregate, so
/// any writes they perform, including saves of other aggregates, commit or
/// roll back together with the triggering change. Returning an error aborts
/// the save that dispatched the event.
#[async_trait]
pub trait DomainEventHandler<D: StorageDriver, R: Record>: Send + Sync {
    /// Name of the event this handler reacts to.
    fn event_name(&self) -> &str;

    /// Handler name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, event: &DomainEvent, uow: &mut UnitOfWork<D, R>) -> Result<()>;
}
