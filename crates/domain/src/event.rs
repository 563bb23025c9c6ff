//! Domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;

/// An immutable record of something that happened to an aggregate.
///
/// Events are queued on their aggregate and delivered by the event bus
/// when the aggregate is saved. Names should be past tense
/// (e.g., "DeliveryCompleted").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    event_name: String,
    occurred_on: DateTime<Utc>,
    payload: serde_json::Value,
}

impl DomainEvent {
    /// Creates an event with a raw JSON payload, stamped with the current time.
    pub fn new(event_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_name: event_name.into(),
            occurred_on: Utc::now(),
            payload,
        }
    }

    /// Creates an event from a serializable payload.
    pub fn from_payload<T: Serialize>(event_name: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self::new(event_name, serde_json::to_value(payload)?))
    }

    /// Overrides the creation timestamp.
    pub fn with_occurred_on(mut self, occurred_on: DateTime<Utc>) -> Self {
        self.occurred_on = occurred_on;
        self
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Decodes the payload into a typed value.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
