//! Back-office domain event names and payloads.

use common::EntityId;
use serde::{Deserialize, Serialize};

pub const ACCOUNT_OPENED: &str = "AccountOpened";
pub const PERMISSION_GRANTED: &str = "PermissionGranted";
pub const ACCOUNT_ARCHIVED: &str = "AccountArchived";
pub const PRODUCT_REGISTERED: &str = "ProductRegistered";
pub const STOCK_ADJUSTED: &str = "StockAdjusted";
pub const PRODUCT_ARCHIVED: &str = "ProductArchived";
pub const DELIVERY_SCHEDULED: &str = "DeliveryScheduled";
pub const DELIVERY_COMPLETED: &str = "DeliveryCompleted";
pub const DELIVERY_CANCELLED: &str = "DeliveryCancelled";
pub const SALE_RECORDED: &str = "SaleRecorded";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountOpenedData {
    pub account_id: EntityId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrantedData {
    pub account_id: EntityId,
    pub permission: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountArchivedData {
    pub account_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRegisteredData {
    pub product_id: EntityId,
    pub sku: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAdjustedData {
    pub product_id: EntityId,
    pub delta: i64,
    pub stock: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductArchivedData {
    pub product_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryScheduledData {
    pub delivery_id: EntityId,
    pub supplier: String,
    pub lines: u32,
}

/// Quantity of one product received with a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedStock {
    pub product_id: EntityId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryCompletedData {
    pub delivery_id: EntityId,
    pub received: Vec<ReceivedStock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryCancelledData {
    pub delivery_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecordedData {
    pub sale_id: EntityId,
    pub account_id: EntityId,
    pub lines: Vec<crate::sale::SaleLine>,
}
