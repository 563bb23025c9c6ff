//! Entity trait: identity + continuity across state changes.

use common::{EntityKey, Identity};

/// Anything with a persistent identity.
///
/// The identity is assigned once, at construction time, usually from the
/// external ID generator. It must not change once the entity has been
/// tracked or persisted: change-tracking deduplicates on [`Entity::key`].
pub trait Entity {
    /// Identity value; scalar or composite.
    type Id: Identity;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Assigns the entity identifier.
    fn set_id(&mut self, id: Self::Id);

    /// Returns the canonical key of the identity.
    fn key(&self) -> EntityKey {
        self.id().key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CompositeId;

    struct Line {
        id: CompositeId,
    }

    impl Entity for Line {
        type Id = CompositeId;

        fn id(&self) -> &CompositeId {
            &self.id
        }

        fn set_id(&mut self, id: CompositeId) {
            self.id = id;
        }
    }

    #[test]
    fn key_is_derived_from_identity() {
        let mut line = Line {
            id: CompositeId::new(),
        };
        line.set_id(CompositeId::new().with("order", "o-1").with("line", 1));
        assert_eq!(line.key().as_str(), r#"{"line":1,"order":"o-1"}"#);
    }
}
