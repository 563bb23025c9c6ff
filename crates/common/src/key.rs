//! Canonical identity keys.
//!
//! Every persisted value exposes its identity as an [`EntityKey`], the string
//! form used for change-tracking deduplication and repository lookups.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::EntityId;

/// Canonical string form of an entity identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    /// Wraps an already-canonical key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An identity value of any shape.
///
/// Implementations must be deterministic: two logically equal identities
/// must always produce the same key.
pub trait Identity: Clone + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static {
    /// Returns the canonical key for this identity.
    fn key(&self) -> EntityKey;
}

impl Identity for EntityId {
    fn key(&self) -> EntityKey {
        EntityKey(self.to_string())
    }
}

impl Identity for Uuid {
    fn key(&self) -> EntityKey {
        EntityKey(self.to_string())
    }
}

impl Identity for String {
    fn key(&self) -> EntityKey {
        EntityKey(self.clone())
    }
}

impl Identity for u64 {
    fn key(&self) -> EntityKey {
        EntityKey(self.to_string())
    }
}

impl Identity for i64 {
    fn key(&self) -> EntityKey {
        EntityKey(self.to_string())
    }
}

/// A composite identity made of named fields.
///
/// The key is rendered as JSON with object fields sorted at every nesting
/// level, so field insertion order never affects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeId {
    fields: BTreeMap<String, CanonicalValue>,
}

impl CompositeId {
    /// Creates an empty composite identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(name.into(), CanonicalValue(value.into()));
        self
    }

    /// Returns a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(|v| &v.0)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the identity has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Identity for CompositeId {
    fn key(&self) -> EntityKey {
        let mut out = String::from("{");
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_string(&mut out, name);
            out.push(':');
            write_canonical(&mut out, &value.0);
        }
        out.push('}');
        EntityKey(out)
    }
}

/// A JSON value compared and hashed through its canonical rendering.
///
/// `serde_json::Value` is not `Hash`, and its map ordering depends on
/// crate features, so equality goes through the canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct CanonicalValue(Value);

impl CanonicalValue {
    fn rendered(&self) -> String {
        let mut out = String::new();
        write_canonical(&mut out, &self.0);
        out
    }
}

impl PartialEq for CanonicalValue {
    fn eq(&self, other: &Self) -> bool {
        self.rendered() == other.rendered()
    }
}

impl Eq for CanonicalValue {}

impl std::hash::Hash for CanonicalValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rendered().hash(state);
    }
}

fn write_string(out: &mut String, s: &str) {
    // Display for Value::String performs JSON escaping and cannot fail.
    let _ = write!(out, "{}", Value::String(s.to_string()));
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, nested)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, name);
                out.push(':');
                write_canonical(out, nested);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::String(s) => write_string(out, s),
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_identities_render_plainly() {
        assert_eq!(42u64.key().as_str(), "42");
        assert_eq!((-7i64).key().as_str(), "-7");
        assert_eq!("SKU-1".to_string().key().as_str(), "SKU-1");
    }

    #[test]
    fn entity_id_key_matches_display() {
        let id = EntityId::new();
        assert_eq!(id.key().as_str(), id.to_string());
    }

    #[test]
    fn composite_key_ignores_insertion_order() {
        let a = CompositeId::new().with("tenant", "acme").with("line", 3);
        let b = CompositeId::new().with("line", 3).with("tenant", "acme");

        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_str(), r#"{"line":3,"tenant":"acme"}"#);
    }

    #[test]
    fn composite_key_sorts_nested_objects() {
        let a = CompositeId::new().with("scope", json!({"z": 1, "a": {"y": true, "b": null}}));
        assert_eq!(
            a.key().as_str(),
            r#"{"scope":{"a":{"b":null,"y":true},"z":1}}"#
        );
    }

    #[test]
    fn composite_key_escapes_strings() {
        let a = CompositeId::new().with("name", "quote\"d");
        assert_eq!(a.key().as_str(), r#"{"name":"quote\"d"}"#);
    }

    #[test]
    fn composite_values_differ_by_content() {
        let a = CompositeId::new().with("line", 1);
        let b = CompositeId::new().with("line", 2);
        assert_ne!(a.key(), b.key());
        assert_ne!(a, b);
    }

    #[test]
    fn composite_get_returns_field() {
        let id = CompositeId::new().with("line", 5);
        assert_eq!(id.get("line"), Some(&json!(5)));
        assert_eq!(id.len(), 1);
        assert!(!id.is_empty());
        assert!(id.get("missing").is_none());
    }
}
