//! Sale aggregate.

use chrono::Utc;
use common::EntityId;
use domain::{AggregateRoot, DomainError, DomainEvent, Entity, PendingChanges, Result};
use serde::{Deserialize, Serialize};

use crate::events::{SALE_RECORDED, SaleRecordedData};
use crate::record::{BackofficeRecord, SaleRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: EntityId,
    pub quantity: u32,
}

impl SaleLine {
    pub fn new(product_id: EntityId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A completed sale. Sales are recorded once and never change.
#[derive(Debug)]
pub struct Sale {
    state: SaleRecord,
    changes: PendingChanges<BackofficeRecord>,
}

impl Sale {
    pub fn record(id: EntityId, account_id: EntityId, lines: Vec<SaleLine>) -> Result<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one line"));
        }
        if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
            return Err(DomainError::validation(format!(
                "quantity for product {} must be positive",
                line.product_id
            )));
        }

        let mut sale = Self {
            state: SaleRecord {
                id,
                account_id,
                lines: lines.clone(),
                recorded_at: Utc::now(),
            },
            changes: PendingChanges::new(),
        };
        sale.mark_new();
        sale.add_domain_event(DomainEvent::from_payload(
            SALE_RECORDED,
            &SaleRecordedData {
                sale_id: id,
                account_id,
                lines,
            },
        )?);
        Ok(sale)
    }

    pub fn from_record(state: SaleRecord) -> Self {
        Self {
            state,
            changes: PendingChanges::new(),
        }
    }

    pub fn account_id(&self) -> EntityId {
        self.state.account_id
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.state.lines
    }
}

impl Entity for Sale {
    type Id = EntityId;

    fn id(&self) -> &EntityId {
        &self.state.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.state.id = id;
    }
}

impl AggregateRoot for Sale {
    type Record = BackofficeRecord;

    fn to_record(&self) -> BackofficeRecord {
        BackofficeRecord::Sale(self.state.clone())
    }

    fn pending_changes(&self) -> &PendingChanges<BackofficeRecord> {
        &self.changes
    }

    fn pending_changes_mut(&mut self) -> &mut PendingChanges<BackofficeRecord> {
        &mut self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ChangeAction;

    #[test]
    fn record_emits_lines() {
        let product = EntityId::new();
        let sale =
            Sale::record(EntityId::new(), EntityId::new(), vec![SaleLine::new(product, 2)]).unwrap();

        assert_eq!(sale.root_action(), ChangeAction::Created);
        let data: SaleRecordedData = sale.domain_events()[0].payload_as().unwrap();
        assert_eq!(data.lines, vec![SaleLine::new(product, 2)]);
    }

    #[test]
    fn empty_or_zero_lines_are_rejected() {
        assert!(Sale::record(EntityId::new(), EntityId::new(), vec![]).is_err());
        assert!(
            Sale::record(
                EntityId::new(),
                EntityId::new(),
                vec![SaleLine::new(EntityId::new(), 0)]
            )
            .is_err()
        );
    }
}
