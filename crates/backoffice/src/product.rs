//! Product aggregate.

use common::EntityId;
use domain::{AggregateRoot, DomainError, DomainEvent, Entity, PendingChanges, Result};

use crate::events::{
    PRODUCT_ARCHIVED, PRODUCT_REGISTERED, ProductArchivedData, ProductRegisteredData,
    STOCK_ADJUSTED, StockAdjustedData,
};
use crate::record::{BackofficeRecord, ProductRecord};

/// A stocked product.
#[derive(Debug)]
pub struct Product {
    state: ProductRecord,
    changes: PendingChanges<BackofficeRecord>,
}

impl Product {
    pub fn register(
        id: EntityId,
        sku: impl Into<String>,
        name: impl Into<String>,
        initial_stock: u64,
    ) -> Result<Self> {
        let sku = sku.into().trim().to_uppercase();
        let name = name.into().trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::validation("SKU must not be empty"));
        }
        if name.is_empty() {
            return Err(DomainError::validation("product name must not be empty"));
        }

        let mut product = Self {
            state: ProductRecord {
                id,
                sku: sku.clone(),
                name,
                stock: initial_stock,
                archived: false,
            },
            changes: PendingChanges::new(),
        };
        product.mark_new();
        product.add_domain_event(DomainEvent::from_payload(
            PRODUCT_REGISTERED,
            &ProductRegisteredData {
                product_id: id,
                sku,
            },
        )?);
        Ok(product)
    }

    /// Rebuilds a product from its stored record.
    pub fn from_record(state: ProductRecord) -> Self {
        Self {
            state,
            changes: PendingChanges::new(),
        }
    }

    pub fn sku(&self) -> &str {
        &self.state.sku
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn stock(&self) -> u64 {
        self.state.stock
    }

    pub fn is_archived(&self) -> bool {
        self.state.archived
    }

    /// Changes the stock level by `delta`.
    ///
    /// Fails with a validation error when the stock would go below zero.
    pub fn adjust_stock(&mut self, delta: i64, reason: impl Into<String>) -> Result<()> {
        if self.state.archived {
            return Err(DomainError::conflict(format!(
                "cannot adjust stock of archived product {}",
                self.state.sku
            )));
        }
        if delta == 0 {
            return Err(DomainError::validation("stock adjustment must not be zero"));
        }

        let stock = self.state.stock.checked_add_signed(delta).ok_or_else(|| {
            DomainError::validation(format!(
                "insufficient stock for {}: {} available, {} requested",
                self.state.sku,
                self.state.stock,
                delta.unsigned_abs()
            ))
        })?;
        self.state.stock = stock;

        self.add_domain_event(DomainEvent::from_payload(
            STOCK_ADJUSTED,
            &StockAdjustedData {
                product_id: self.state.id,
                delta,
                stock,
                reason: reason.into(),
            },
        )?);
        Ok(())
    }

    pub fn archive(&mut self) -> Result<()> {
        if self.state.archived {
            return Err(DomainError::conflict(format!(
                "product {} is already archived",
                self.state.sku
            )));
        }
        self.state.archived = true;
        self.add_domain_event(DomainEvent::from_payload(
            PRODUCT_ARCHIVED,
            &ProductArchivedData {
                product_id: self.state.id,
            },
        )?);
        Ok(())
    }
}

impl Entity for Product {
    type Id = EntityId;

    fn id(&self) -> &EntityId {
        &self.state.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.state.id = id;
    }
}

impl AggregateRoot for Product {
    type Record = BackofficeRecord;

    fn to_record(&self) -> BackofficeRecord {
        BackofficeRecord::Product(self.state.clone())
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

    fn product(stock: u64) -> Product {
        let mut product = Product::register(EntityId::new(), " sku-1 ", "Widget", stock).unwrap();
        product.clear_domain_events();
        product
    }

    #[test]
    fn register_validates_and_normalizes() {
        let product = product(0);
        assert_eq!(product.sku(), "SKU-1");
        assert!(matches!(
            Product::register(EntityId::new(), "  ", "Widget", 0),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn adjust_stock_emits_new_level() {
        let mut product = product(5);
        product.adjust_stock(3, "delivery").unwrap();
        product.adjust_stock(-8, "sale").unwrap();
        assert_eq!(product.stock(), 0);

        let last: StockAdjustedData = product.domain_events()[1].payload_as().unwrap();
        assert_eq!(last.delta, -8);
        assert_eq!(last.stock, 0);
        assert_eq!(last.reason, "sale");
    }

    #[test]
    fn negative_stock_is_rejected() {
        let mut product = product(2);
        let result = product.adjust_stock(-3, "sale");
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(product.stock(), 2);
        assert!(product.domain_events().is_empty());
    }

    #[test]
    fn archived_product_cannot_change() {
        let mut product = product(2);
        product.archive().unwrap();
        assert!(matches!(product.archive(), Err(DomainError::Conflict(_))));
        assert!(matches!(
            product.adjust_stock(1, "delivery"),
            Err(DomainError::Conflict(_))
        ));
    }
}
