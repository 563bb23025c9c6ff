//! Unit of work and in-transaction domain event bus.
//!
//! This crate provides:
//! - [`UnitOfWork`], which binds one transaction to its repositories and runs
//!   cascading saves
//! - [`DomainEventBus`] and [`DomainEventHandler`], sequential depth-first
//!   delivery of domain events inside the saving transaction
//! - [`TransactionManager`], the begin → work → commit / rollback driver
//! - [`UnitOfWorkConfig`], cascade and timeout settings

pub mod bus;
pub mod config;
pub mod handler;
pub mod manager;
pub mod unit_of_work;

pub use bus::DomainEventBus;
pub use config::{DEFAULT_MAX_CASCADE_DEPTH, UnitOfWorkConfig};
pub use handler::DomainEventHandler;
pub use manager::TransactionManager;
pub use persistence::{Error, ErrorCategory, Result};
pub use unit_of_work::{CascadeFrame, TransactionState, UnitOfWork};
