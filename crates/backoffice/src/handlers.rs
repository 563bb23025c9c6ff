//! Event handlers that keep stock levels in step with deliveries and sales.
//!
//! Both run inside the transaction of the aggregate that raised the event,
//! so a stock change is committed or rolled back together with it.

use async_trait::async_trait;
use domain::DomainEvent;
use persistence::{Result, StorageDriver};
use unit_of_work::{DomainEventHandler, UnitOfWork};

use crate::events::{DELIVERY_COMPLETED, DeliveryCompletedData, SALE_RECORDED, SaleRecordedData};
use crate::load;
use crate::record::BackofficeRecord;

/// Adds received quantities to product stock when a delivery completes.
pub struct ReceiveStockOnDeliveryCompleted;

#[async_trait]
impl<D: StorageDriver> DomainEventHandler<D, BackofficeRecord> for ReceiveStockOnDeliveryCompleted {
    fn event_name(&self) -> &str {
        DELIVERY_COMPLETED
    }

    fn name(&self) -> &str {
        "ReceiveStockOnDeliveryCompleted"
    }

    async fn handle(
        &self,
        event: &DomainEvent,
        uow: &mut UnitOfWork<D, BackofficeRecord>,
    ) -> Result<()> {
        let data: DeliveryCompletedData = event.payload_as()?;
        let reason = format!("delivery {}", data.delivery_id);

        for received in &data.received {
            let mut product = load::product(uow, received.product_id).await?;
            product.adjust_stock(i64::from(received.quantity), reason.as_str())?;
            uow.save(&mut product).await?;
            tracing::debug!(
                product = %received.product_id,
                quantity = received.quantity,
                stock = product.stock(),
                "stock received"
            );
        }
        Ok(())
    }
}

/// Takes sold quantities out of product stock.
///
/// A product without enough stock fails the handler, which aborts the save
/// of the sale.
pub struct ReserveStockOnSaleRecorded;

#[async_trait]
impl<D: StorageDriver> DomainEventHandler<D, BackofficeRecord> for ReserveStockOnSaleRecorded {
    fn event_name(&self) -> &str {
        SALE_RECORDED
    }

    fn name(&self) -> &str {
        "ReserveStockOnSaleRecorded"
    }

    async fn handle(
        &self,
        event: &DomainEvent,
        uow: &mut UnitOfWork<D, BackofficeRecord>,
    ) -> Result<()> {
        let data: SaleRecordedData = event.payload_as()?;
        let reason = format!("sale {}", data.sale_id);

        for line in &data.lines {
            let mut product = load::product(uow, line.product_id).await?;
            product.adjust_stock(-i64::from(line.quantity), reason.as_str())?;
            uow.save(&mut product).await?;
        }
        Ok(())
    }
}
