//! Persistable kinds and records of the back office.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{EntityId, EntityKey, Identity};
use domain::{DomainError, Entity, EntityKind, Record};
use serde::{Deserialize, Serialize};

use crate::delivery::{DeliveryItem, DeliveryStatus};
use crate::sale::SaleLine;

/// Every kind the back office persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackofficeKind {
    Account,
    Product,
    Delivery,
    DeliveryItem,
    Sale,
}

impl EntityKind for BackofficeKind {
    fn all() -> &'static [Self] {
        &[
            BackofficeKind::Account,
            BackofficeKind::Product,
            BackofficeKind::Delivery,
            BackofficeKind::DeliveryItem,
            BackofficeKind::Sale,
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            BackofficeKind::Account => "Account",
            BackofficeKind::Product => "Product",
            BackofficeKind::Delivery => "Delivery",
            BackofficeKind::DeliveryItem => "DeliveryItem",
            BackofficeKind::Sale => "Sale",
        }
    }
}

impl std::fmt::Display for BackofficeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: EntityId,
    pub email: String,
    pub permissions: BTreeSet<String>,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: EntityId,
    pub sku: String,
    pub name: String,
    pub stock: u64,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: EntityId,
    pub supplier: String,
    pub status: DeliveryStatus,
    /// Number of item lines, numbered from 1.
    pub lines: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: EntityId,
    pub account_id: EntityId,
    pub lines: Vec<SaleLine>,
    pub recorded_at: DateTime<Utc>,
}

/// A persisted back-office value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum BackofficeRecord {
    Account(AccountRecord),
    Product(ProductRecord),
    Delivery(DeliveryRecord),
    DeliveryItem(DeliveryItem),
    Sale(SaleRecord),
}

impl Record for BackofficeRecord {
    type Kind = BackofficeKind;

    fn kind(&self) -> BackofficeKind {
        match self {
            BackofficeRecord::Account(_) => BackofficeKind::Account,
            BackofficeRecord::Product(_) => BackofficeKind::Product,
            BackofficeRecord::Delivery(_) => BackofficeKind::Delivery,
            BackofficeRecord::DeliveryItem(_) => BackofficeKind::DeliveryItem,
            BackofficeRecord::Sale(_) => BackofficeKind::Sale,
        }
    }

    fn key(&self) -> EntityKey {
        match self {
            BackofficeRecord::Account(r) => r.id.key(),
            BackofficeRecord::Product(r) => r.id.key(),
            BackofficeRecord::Delivery(r) => r.id.key(),
            BackofficeRecord::DeliveryItem(item) => item.key(),
            BackofficeRecord::Sale(r) => r.id.key(),
        }
    }
}

impl From<DeliveryItem> for BackofficeRecord {
    fn from(item: DeliveryItem) -> Self {
        BackofficeRecord::DeliveryItem(item)
    }
}

fn unexpected(expected: BackofficeKind, found: &BackofficeRecord) -> DomainError {
    DomainError::validation(format!(
        "expected a {expected} record, found {}",
        found.kind()
    ))
}

macro_rules! record_conversion {
    ($variant:ident, $ty:ty) => {
        impl TryFrom<BackofficeRecord> for $ty {
            type Error = DomainError;

            fn try_from(record: BackofficeRecord) -> Result<Self, Self::Error> {
                match record {
                    BackofficeRecord::$variant(inner) => Ok(inner),
                    other => Err(unexpected(BackofficeKind::$variant, &other)),
                }
            }
        }
    };
}

record_conversion!(Account, AccountRecord);
record_conversion!(Product, ProductRecord);
record_conversion!(Delivery, DeliveryRecord);
record_conversion!(DeliveryItem, DeliveryItem);
record_conversion!(Sale, SaleRecord);
