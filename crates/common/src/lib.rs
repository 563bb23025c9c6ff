//! Identity primitives shared across the workspace.

pub mod key;
pub mod types;

pub use key::{CompositeId, EntityKey, Identity};
pub use types::EntityId;
