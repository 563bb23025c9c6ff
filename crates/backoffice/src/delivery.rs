//! Delivery aggregate and its item lines.

use common::{CompositeId, EntityId, EntityKey, Identity};
use domain::{
    AggregateRoot, ChangeAction, DomainError, DomainEvent, Entity, EntityKind, PendingChanges,
    Result,
};
use serde::{Deserialize, Serialize};

use crate::events::{
    DELIVERY_CANCELLED, DELIVERY_COMPLETED, DELIVERY_SCHEDULED, DeliveryCancelledData,
    DeliveryCompletedData, DeliveryScheduledData, ReceivedStock,
};
use crate::record::{BackofficeKind, BackofficeRecord, DeliveryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Scheduled => write!(f, "Scheduled"),
            DeliveryStatus::Completed => write!(f, "Completed"),
            DeliveryStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Composite identity of a delivery line.
pub fn item_id(delivery_id: EntityId, line: u32) -> CompositeId {
    CompositeId::new()
        .with("delivery_id", delivery_id.to_string())
        .with("line", line)
}

/// One expected product line of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryItem {
    id: CompositeId,
    pub delivery_id: EntityId,
    pub line: u32,
    pub product_id: EntityId,
    pub expected: u32,
    pub received: u32,
}

impl DeliveryItem {
    pub fn new(delivery_id: EntityId, line: u32, product_id: EntityId, expected: u32) -> Self {
        Self {
            id: item_id(delivery_id, line),
            delivery_id,
            line,
            product_id,
            expected,
            received: 0,
        }
    }
}

impl Entity for DeliveryItem {
    type Id = CompositeId;

    fn id(&self) -> &CompositeId {
        &self.id
    }

    fn set_id(&mut self, id: CompositeId) {
        self.id = id;
    }
}

/// An inbound delivery from a supplier.
///
/// Lines are numbered from 1 in scheduling order. Receiving quantities only
/// touches the line; completing the delivery writes every line and reports
/// the received quantities so stock can follow.
#[derive(Debug)]
pub struct Delivery {
    state: DeliveryRecord,
    items: Vec<DeliveryItem>,
    changes: PendingChanges<BackofficeRecord>,
}

impl Delivery {
    /// Schedules a delivery of `(product, expected quantity)` lines.
    pub fn schedule(
        id: EntityId,
        supplier: impl Into<String>,
        lines: Vec<(EntityId, u32)>,
    ) -> Result<Self> {
        let supplier = supplier.into().trim().to_string();
        if supplier.is_empty() {
            return Err(DomainError::validation("supplier must not be empty"));
        }
        if lines.is_empty() {
            return Err(DomainError::validation("a delivery needs at least one line"));
        }
        let count = line_count(lines.len())?;
        if let Some((product_id, _)) = lines.iter().find(|(_, quantity)| *quantity == 0) {
            return Err(DomainError::validation(format!(
                "expected quantity for product {product_id} must be positive"
            )));
        }

        let items: Vec<DeliveryItem> = lines
            .into_iter()
            .zip(1u32..)
            .map(|((product_id, expected), line)| DeliveryItem::new(id, line, product_id, expected))
            .collect();

        let mut delivery = Self {
            state: DeliveryRecord {
                id,
                supplier: supplier.clone(),
                status: DeliveryStatus::Scheduled,
                lines: count,
            },
            items,
            changes: PendingChanges::new(),
        };
        delivery.mark_new();
        for item in delivery.items.clone() {
            delivery.add_tracked_entity(item, ChangeAction::Created);
        }
        delivery.add_domain_event(DomainEvent::from_payload(
            DELIVERY_SCHEDULED,
            &DeliveryScheduledData {
                delivery_id: id,
                supplier,
                lines: delivery.state.lines,
            },
        )?);
        Ok(delivery)
    }

    /// Rebuilds a delivery from its stored record and item lines.
    pub fn from_records(state: DeliveryRecord, mut items: Vec<DeliveryItem>) -> Result<Self> {
        if items.len() != state.lines as usize {
            return Err(DomainError::validation(format!(
                "delivery {} has {} lines, {} loaded",
                state.id,
                state.lines,
                items.len()
            )));
        }
        items.sort_by_key(|item| item.line);
        Ok(Self {
            state,
            items,
            changes: PendingChanges::new(),
        })
    }

    /// Keys of the item lines of a stored delivery, in line order.
    pub fn item_keys(state: &DeliveryRecord) -> Vec<EntityKey> {
        (1..=state.lines)
            .map(|line| item_id(state.id, line).key())
            .collect()
    }

    pub fn supplier(&self) -> &str {
        &self.state.supplier
    }

    pub fn status(&self) -> DeliveryStatus {
        self.state.status
    }

    pub fn items(&self) -> &[DeliveryItem] {
        &self.items
    }

    /// Records a received quantity on a line.
    pub fn receive_item(&mut self, line: u32, quantity: u32) -> Result<()> {
        self.ensure_scheduled("receive items on")?;
        if quantity == 0 {
            return Err(DomainError::validation("received quantity must be positive"));
        }

        let id = self.state.id;
        let item = self
            .items
            .iter_mut()
            .find(|item| item.line == line)
            .ok_or_else(|| {
                DomainError::not_found(BackofficeKind::DeliveryItem.name(), item_id(id, line).key())
            })?;
        item.received = item.received.saturating_add(quantity);

        let item = item.clone();
        self.add_tracked_entity(item, ChangeAction::Updated);
        Ok(())
    }

    /// Closes the delivery and reports what was received.
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_scheduled("complete")?;
        self.state.status = DeliveryStatus::Completed;

        for item in self.items.clone() {
            self.add_tracked_entity(item, ChangeAction::Updated);
        }

        let received = self
            .items
            .iter()
            .filter(|item| item.received > 0)
            .map(|item| ReceivedStock {
                product_id: item.product_id,
                quantity: item.received,
            })
            .collect();

        self.add_domain_event(DomainEvent::from_payload(
            DELIVERY_COMPLETED,
            &DeliveryCompletedData {
                delivery_id: self.state.id,
                received,
            },
        )?);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_scheduled("cancel")?;
        self.state.status = DeliveryStatus::Cancelled;
        self.add_domain_event(DomainEvent::from_payload(
            DELIVERY_CANCELLED,
            &DeliveryCancelledData {
                delivery_id: self.state.id,
            },
        )?);
        Ok(())
    }

    fn ensure_scheduled(&self, action: &str) -> Result<()> {
        if self.state.status != DeliveryStatus::Scheduled {
            return Err(DomainError::conflict(format!(
                "cannot {action} delivery {} in status {}",
                self.state.id, self.state.status
            )));
        }
        Ok(())
    }
}

fn line_count(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| DomainError::validation(format!("a delivery cannot have {len} lines")))
}

impl Entity for Delivery {
    type Id = EntityId;

    fn id(&self) -> &EntityId {
        &self.state.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.state.id = id;
    }
}

impl AggregateRoot for Delivery {
    type Record = BackofficeRecord;

    fn to_record(&self) -> BackofficeRecord {
        BackofficeRecord::Delivery(self.state.clone())
    }

    fn pending_changes(&self) -> &PendingChanges<BackofficeRecord> {
        &self.changes
    }

    fn pending_changes_mut(&mut self) -> &mut PendingChanges<BackofficeRecord> {
        &mut self.changes
    }
}
