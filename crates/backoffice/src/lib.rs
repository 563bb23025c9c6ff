//! Back-office business layer built on the unit of work.
//!
//! This crate provides:
//! - [`Account`], [`Product`], [`Delivery`] and [`Sale`] aggregates
//! - [`BackofficeKind`] and [`BackofficeRecord`], the closed set of persisted kinds
//! - stock-keeping event handlers that run inside the saving transaction
//! - [`BackofficeService`], one transactional method per operation
//! - bootstrap for the in-memory and PostgreSQL backends, configuration and
//!   telemetry for the binaries

pub mod account;
pub mod bootstrap;
pub mod config;
pub mod delivery;
pub mod events;
pub mod handlers;
pub mod load;
pub mod product;
pub mod record;
pub mod sale;
pub mod service;
pub mod telemetry;

pub use account::Account;
pub use bootstrap::{Backend, Manager, MemoryDriver};
pub use config::{Config, LogFormat};
pub use delivery::{Delivery, DeliveryItem, DeliveryStatus};
pub use handlers::{ReceiveStockOnDeliveryCompleted, ReserveStockOnSaleRecorded};
pub use product::Product;
pub use record::{BackofficeKind, BackofficeRecord};
pub use sale::{Sale, SaleLine};
pub use service::BackofficeService;
