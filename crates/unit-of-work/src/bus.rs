//! In-transaction domain event bus.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use domain::{AggregateRoot, DomainEvent, Record};
use persistence::{Result, StorageDriver};

use crate::handler::DomainEventHandler;
use crate::unit_of_work::UnitOfWork;

/// Registry of named handlers that delivers an aggregate's queued events.
///
/// Delivery is strictly sequential:
/// - events are processed oldest first;
/// - every handler registered for an event runs, in registration order,
///   before the next event is looked at;
/// - a handler that saves another aggregate completes that save, including
///   its own dispatch, before the loop moves on (depth-first);
/// - the first handler error stops delivery and is returned as-is.
///
/// Events without handlers are skipped.
pub struct DomainEventBus<D: StorageDriver, R: Record> {
    handlers: HashMap<String, Vec<Arc<dyn DomainEventHandler<D, R>>>>,
}

impl<D: StorageDriver, R: Record> Default for DomainEventBus<D, R> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<D: StorageDriver, R: Record> DomainEventBus<D, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the list for its event name.
    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: DomainEventHandler<D, R> + 'static,
    {
        let event_name = handler.event_name().to_string();
        tracing::debug!(event = %event_name, handler = handler.name(), "event handler registered");
        self.handlers
            .entry(event_name)
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Number of handlers registered for an event name.
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers.get(event_name).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Delivers the aggregate's queued events through `uow`.
    ///
    /// The aggregate's event log is read, not drained: clearing it is the
    /// caller's job once the whole save has succeeded.
    pub async fn dispatch<A>(&self, aggregate: &A, uow: &mut UnitOfWork<D, R>) -> Result<()>
    where
        A: AggregateRoot<Record = R>,
    {
        let mut queue: VecDeque<&DomainEvent> = aggregate.domain_events().iter().collect();

        while let Some(event) = queue.pop_front() {
            let Some(handlers) = self.handlers.get(event.event_name()) else {
                tracing::trace!(event = event.event_name(), "no handlers registered");
                continue;
            };

            for handler in handlers {
                tracing::debug!(
                    event = event.event_name(),
                    handler = handler.name(),
                    "invoking event handler"
                );
                if let Err(error) = handler.handle(event, uow).await {
                    metrics::counter!("domain_event_handler_failures_total").increment(1);
                    tracing::warn!(
                        event = event.event_name(),
                        handler = handler.name(),
                        remaining_events = queue.len(),
                        %error,
                        "event handler failed, aborting dispatch"
                    );
                    return Err(error);
                }
            }
            metrics::counter!("domain_events_dispatched_total").increment(1);
        }

        Ok(())
    }
}
