//! Account aggregate.

use std::collections::BTreeSet;

use common::EntityId;
use domain::{AggregateRoot, DomainError, DomainEvent, Entity, PendingChanges, Result};

use crate::events::{
    ACCOUNT_ARCHIVED, ACCOUNT_OPENED, AccountArchivedData, AccountOpenedData,
    PERMISSION_GRANTED, PermissionGrantedData,
};
use crate::record::{AccountRecord, BackofficeRecord};

/// A back-office user account.
#[derive(Debug)]
pub struct Account {
    state: AccountRecord,
    changes: PendingChanges<BackofficeRecord>,
}

impl Account {
    /// Opens a new account. The email must look like `local@domain`.
    pub fn open(id: EntityId, email: impl Into<String>) -> Result<Self> {
        let email = email.into().trim().to_lowercase();
        validate_email(&email)?;

        let mut account = Self {
            state: AccountRecord {
                id,
                email: email.clone(),
                permissions: BTreeSet::new(),
                archived: false,
            },
            changes: PendingChanges::new(),
        };
        account.mark_new();
        account.add_domain_event(DomainEvent::from_payload(
            ACCOUNT_OPENED,
            &AccountOpenedData {
                account_id: id,
                email,
            },
        )?);
        Ok(account)
    }

    /// Rebuilds an account from its stored record.
    pub fn from_record(state: AccountRecord) -> Self {
        Self {
            state,
            changes: PendingChanges::new(),
        }
    }

    pub fn email(&self) -> &str {
        &self.state.email
    }

    pub fn permissions(&self) -> impl Iterator<Item = &str> {
        self.state.permissions.iter().map(String::as_str)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.state.permissions.contains(permission)
    }

    pub fn is_archived(&self) -> bool {
        self.state.archived
    }

    /// Grants a permission. Returns false if the account already had it.
    pub fn grant_permission(&mut self, permission: impl Into<String>) -> Result<bool> {
        self.ensure_active("grant a permission to")?;

        let permission = permission.into();
        if permission.trim().is_empty() {
            return Err(DomainError::validation("permission name must not be empty"));
        }
        if !self.state.permissions.insert(permission.clone()) {
            return Ok(false);
        }

        self.add_domain_event(DomainEvent::from_payload(
            PERMISSION_GRANTED,
            &PermissionGrantedData {
                account_id: self.state.id,
                permission,
            },
        )?);
        Ok(true)
    }

    pub fn archive(&mut self) -> Result<()> {
        self.ensure_active("archive")?;
        self.state.archived = true;
        self.add_domain_event(DomainEvent::from_payload(
            ACCOUNT_ARCHIVED,
            &AccountArchivedData {
                account_id: self.state.id,
            },
        )?);
        Ok(())
    }

    fn ensure_active(&self, action: &str) -> Result<()> {
        if self.state.archived {
            return Err(DomainError::conflict(format!(
                "cannot {action} archived account {}",
                self.state.id
            )));
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!("invalid email address: {email:?}")))
    }
}

impl Entity for Account {
    type Id = EntityId;

    fn id(&self) -> &EntityId {
        &self.state.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.state.id = id;
    }
}

impl AggregateRoot for Account {
    type Record = BackofficeRecord;

    fn to_record(&self) -> BackofficeRecord {
        BackofficeRecord::Account(self.state.clone())
    }

    fn pending_changes(&self) -> &PendingChanges<BackofficeRecord> {
        &self.changes
    }

    fn pending_changes_mut(&mut self) -> &mut PendingChanges<BackofficeRecord> {
        &mut self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ChangeAction;

    fn account() -> Account {
        Account::open(EntityId::new(), "Ops@Example.com").unwrap()
    }

    #[test]
    fn open_normalizes_email_and_marks_new() {
        let account = account();
        assert_eq!(account.email(), "ops@example.com");
        assert_eq!(account.root_action(), ChangeAction::Created);
        assert_eq!(account.domain_events()[0].event_name(), ACCOUNT_OPENED);
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["", "no-at-sign", "@example.com", "a@b", "a@.com", "a b@example.com"] {
            let result = Account::open(EntityId::new(), email);
            assert!(
                matches!(result, Err(DomainError::Validation(_))),
                "{email:?} should be rejected"
            );
        }
    }

    #[test]
    fn granting_queues_one_event_per_new_permission() {
        let mut account = account();
        account.clear_domain_events();

        assert!(account.grant_permission("sales").unwrap());
        assert!(account.grant_permission("stock").unwrap());
        assert!(!account.grant_permission("sales").unwrap());

        let events = account.domain_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_name() == PERMISSION_GRANTED));
        let data: PermissionGrantedData = events[1].payload_as().unwrap();
        assert_eq!(data.permission, "stock");
    }

    #[test]
    fn archiving_twice_is_a_conflict() {
        let mut account = account();
        account.archive().unwrap();
        assert!(account.is_archived());
        assert!(matches!(account.archive(), Err(DomainError::Conflict(_))));
        assert!(matches!(
            account.grant_permission("sales"),
            Err(DomainError::Conflict(_))
        ));
    }
}
