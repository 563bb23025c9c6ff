//! Kind-keyed repository registry.

use std::collections::HashMap;
use std::sync::Arc;

use domain::{EntityKind, Record};

use crate::driver::StorageDriver;
use crate::error::{ConfigurationError, Result};
use crate::repository::Repository;

type Constructor<D, R> =
    Arc<dyn Fn(<D as StorageDriver>::Transaction) -> Arc<dyn Repository<R>> + Send + Sync>;

/// Maps each [`EntityKind`] to a constructor for its repository.
///
/// Every kind is registered once at process startup. [`verify_complete`]
/// checks the registry against `EntityKind::all()` so a missing registration
/// fails at boot instead of in the middle of a save.
///
/// [`verify_complete`]: RepositoryFactory::verify_complete
pub struct RepositoryFactory<D: StorageDriver, R: Record> {
    constructors: HashMap<R::Kind, Constructor<D, R>>,
}

impl<D: StorageDriver, R: Record> Default for RepositoryFactory<D, R> {
    fn default() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }
}

impl<D: StorageDriver, R: Record> RepositoryFactory<D, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the repository constructor for a kind.
    pub fn register<F, Repo>(&mut self, kind: R::Kind, constructor: F) -> Result<&mut Self>
    where
        F: Fn(D::Transaction) -> Repo + Send + Sync + 'static,
        Repo: Repository<R> + 'static,
    {
        if self.constructors.contains_key(&kind) {
            return Err(ConfigurationError::DuplicateRegistration { kind: kind.name() }.into());
        }
        self.constructors.insert(
            kind,
            Arc::new(move |tx| Arc::new(constructor(tx)) as Arc<dyn Repository<R>>),
        );
        tracing::debug!(kind = kind.name(), "repository registered");
        Ok(self)
    }

    /// Builds a new repository for `kind` bound to `tx`.
    pub fn repository_for(&self, kind: R::Kind, tx: D::Transaction) -> Result<Arc<dyn Repository<R>>> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or(ConfigurationError::RepositoryNotRegistered { kind: kind.name() })?;
        Ok(constructor(tx))
    }

    pub fn is_registered(&self, kind: R::Kind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Registered kinds, in `EntityKind::all()` order.
    pub fn registered_kinds(&self) -> Vec<R::Kind> {
        R::Kind::all()
            .iter()
            .copied()
            .filter(|kind| self.is_registered(*kind))
            .collect()
    }

    /// Fails with every kind that has no registration.
    pub fn verify_complete(&self) -> Result<()> {
        let missing: Vec<&'static str> = R::Kind::all()
            .iter()
            .filter(|kind| !self.is_registered(**kind))
            .map(|kind| kind.name())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::MissingRegistrations { kinds: missing }.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::{InMemoryDriver, InMemoryRepository};
    use crate::test_support::{Kind, Rec};

    type Factory = RepositoryFactory<InMemoryDriver<Rec>, Rec>;

    fn register(factory: &mut Factory, kind: Kind) -> Result<()> {
        factory
            .register(kind, move |tx| InMemoryRepository::new(kind, tx))
            .map(|_| ())
    }

    #[tokio::test]
    async fn builds_repository_for_registered_kind() {
        let driver = InMemoryDriver::new();
        let mut factory = Factory::new();
        register(&mut factory, Kind::Widget).unwrap();

        let tx = crate::StorageDriver::begin(&driver).await.unwrap();
        let repo = factory.repository_for(Kind::Widget, tx).unwrap();
        assert_eq!(repo.kind(), Kind::Widget);
    }

    #[tokio::test]
    async fn unregistered_kind_is_a_configuration_error() {
        let driver = InMemoryDriver::new();
        let factory = Factory::new();

        let tx = crate::StorageDriver::begin(&driver).await.unwrap();
        let result = factory.repository_for(Kind::Gadget, tx);
        assert!(matches!(
            result,
            Err(Error::Configuration(
                ConfigurationError::RepositoryNotRegistered { kind: "Gadget" }
            ))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut factory = Factory::new();
        register(&mut factory, Kind::Widget).unwrap();
        let result = register(&mut factory, Kind::Widget);
        assert!(matches!(
            result,
            Err(Error::Configuration(
                ConfigurationError::DuplicateRegistration { .. }
            ))
        ));
    }

    #[test]
    fn verify_complete_lists_missing_kinds() {
        let mut factory = Factory::new();
        register(&mut factory, Kind::Widget).unwrap();

        match factory.verify_complete() {
            Err(Error::Configuration(ConfigurationError::MissingRegistrations { kinds })) => {
                assert_eq!(kinds, vec!["Gadget"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        register(&mut factory, Kind::Gadget).unwrap();
        assert!(factory.verify_complete().is_ok());
        assert_eq!(factory.registered_kinds(), vec![Kind::Widget, Kind::Gadget]);
    }
}
