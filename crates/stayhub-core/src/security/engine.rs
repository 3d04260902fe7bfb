//! Policy interpreter.

use std::collections::HashSet;
use std::sync::Arc;

use super::policy::{FieldScope, Operation, PolicyRule, PolicyTable, RecordScope};
use super::principal::Principal;
use crate::catalog::{OwnerField, Registry};
use crate::error::Error;
use crate::record::Record;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Permitted; the caller must strip fields outside the scope.
    Allow(FieldScope),
    /// Refused. Carries no reason.
    Deny,
}

impl Decision {
    /// Check if the decision permits the request.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// Convert into the visible field scope or a uniform denial error.
    pub fn into_result(self) -> Result<FieldScope, Error> {
        match self {
            Decision::Allow(scope) => Ok(scope),
            Decision::Deny => Err(Error::AuthorizationDenied),
        }
    }
}

/// Evaluates `(principal, operation, entity, record)` tuples against the
/// ordered policy table.
///
/// Pure and lock-free: safe to share across threads.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    registry: Arc<Registry>,
    table: Arc<PolicyTable>,
    platform_owners: HashSet<String>,
}

impl PolicyEngine {
    /// Create an engine over a registry and rule table.
    pub fn new(registry: Arc<Registry>, table: Arc<PolicyTable>) -> Self {
        Self {
            registry,
            table,
            platform_owners: HashSet::new(),
        }
    }

    /// Restrict platform-owned tables to these principal ids.
    ///
    /// With an empty set any identified principal acts as platform owner.
    pub fn with_platform_owners(mut self, owners: impl IntoIterator<Item = String>) -> Self {
        self.platform_owners = owners.into_iter().collect();
        self
    }

    /// Get the registry the engine resolves entities against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Decide whether `principal` may perform `operation` on `entity`.
    ///
    /// `record` is the stored record for read/update/delete, or the incoming
    /// record for create. Rules are scanned in declaration order; the first
    /// rule whose full condition holds grants. Exhausting the list denies.
    pub fn authorize(
        &self,
        principal: &Principal,
        operation: Operation,
        entity: &str,
        record: Option<&Record>,
    ) -> Decision {
        let Ok(def) = self.registry.describe(entity) else {
            tracing::debug!(entity, op = %operation, "deny: unknown entity");
            return Decision::Deny;
        };

        let class = principal.class();
        for rule in self.table.rules_for(entity) {
            if !rule.applies_to(operation, class) {
                continue;
            }
            if self.condition_holds(rule, principal, &def.owner, record) {
                return Decision::Allow(rule.fields.clone());
            }
        }

        tracing::debug!(entity, op = %operation, principal = %principal, "deny");
        Decision::Deny
    }

    /// Authorize or fail with [`Error::AuthorizationDenied`].
    pub fn require(
        &self,
        principal: &Principal,
        operation: Operation,
        entity: &str,
        record: Option<&Record>,
    ) -> Result<FieldScope, Error> {
        self.authorize(principal, operation, entity, record)
            .into_result()
    }

    fn condition_holds(
        &self,
        rule: &PolicyRule,
        principal: &Principal,
        owner: &OwnerField,
        record: Option<&Record>,
    ) -> bool {
        match rule.records {
            RecordScope::Any => true,
            RecordScope::OwnerOnly => self.is_owner(principal, owner, record),
        }
    }

    fn is_owner(&self, principal: &Principal, owner: &OwnerField, record: Option<&Record>) -> bool {
        let Some(principal_id) = principal.id() else {
            return false;
        };

        match owner {
            OwnerField::Platform => {
                self.platform_owners.is_empty() || self.platform_owners.contains(principal_id)
            }
            OwnerField::None => false,
            OwnerField::Identity => record.is_some_and(|r| r.id == principal_id),
            OwnerField::Field(field) => {
                record.and_then(|r| r.get_str(field)) == Some(principal_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AMENITY, MASTER_AMENITY, PROPERTY, USER};

    fn listing_engine() -> PolicyEngine {
        PolicyEngine::new(
            Arc::new(Registry::listing()),
            Arc::new(PolicyTable::listing()),
        )
    }

    #[test]
    fn test_public_entity_allows_anonymous() {
        let engine = listing_engine();
        let record = Record::new("p1").with("title", "Loft");
        for op in Operation::ALL {
            assert!(engine
                .authorize(&Principal::Anonymous, op, PROPERTY, Some(&record))
                .is_allowed());
        }
    }

    #[test]
    fn test_owner_write_denies_anonymous_mutation() {
        let engine = listing_engine();
        let record = Record::new("a1").with("propId", "p1").with("owner", "u1");

        for op in Operation::READ {
            assert!(engine
                .authorize(&Principal::Anonymous, op, AMENITY, Some(&record))
                .is_allowed());
        }
        for op in Operation::WRITE {
            assert_eq!(
                engine.authorize(&Principal::Anonymous, op, AMENITY, Some(&record)),
                Decision::Deny
            );
        }
    }

    #[test]
    fn test_owner_only_compares_owner_field() {
        let engine = listing_engine();
        let record = Record::new("a1").with("propId", "p1").with("owner", "u1");

        let owner = Principal::identified("u1");
        let other = Principal::identified("u2");

        assert!(engine
            .authorize(&owner, Operation::Update, AMENITY, Some(&record))
            .is_allowed());
        assert!(!engine
            .authorize(&other, Operation::Update, AMENITY, Some(&record))
            .is_allowed());
        assert!(!engine
            .authorize(&other, Operation::Delete, AMENITY, Some(&record))
            .is_allowed());
        // Read falls through to the broader identified read rule.
        assert!(engine
            .authorize(&other, Operation::Read, AMENITY, Some(&record))
            .is_allowed());
    }

    #[test]
    fn test_owner_only_without_record_denies() {
        let engine = listing_engine();
        let principal = Principal::identified("u1");
        assert!(!engine
            .authorize(&principal, Operation::Delete, AMENITY, None)
            .is_allowed());
    }

    #[test]
    fn test_create_checks_incoming_owner() {
        let engine = listing_engine();
        let principal = Principal::identified("u1");

        let mine = Record::default().with("propId", "p1").with("owner", "u1");
        let theirs = Record::default().with("propId", "p1").with("owner", "u9");

        assert!(engine
            .authorize(&principal, Operation::Create, AMENITY, Some(&mine))
            .is_allowed());
        assert!(!engine
            .authorize(&principal, Operation::Create, AMENITY, Some(&theirs))
            .is_allowed());
    }

    #[test]
    fn test_platform_owned_tables() {
        let open = listing_engine();
        let restricted = listing_engine().with_platform_owners(["admin".to_string()]);
        let record = Record::new("m1").with("name", "Pool");

        let admin = Principal::identified("admin");
        let guest = Principal::identified("guest");

        assert!(open
            .authorize(&guest, Operation::Create, MASTER_AMENITY, Some(&record))
            .is_allowed());
        assert!(restricted
            .authorize(&admin, Operation::Create, MASTER_AMENITY, Some(&record))
            .is_allowed());
        assert!(!restricted
            .authorize(&guest, Operation::Create, MASTER_AMENITY, Some(&record))
            .is_allowed());
        assert!(!restricted
            .authorize(&Principal::Anonymous, Operation::Delete, MASTER_AMENITY, Some(&record))
            .is_allowed());
    }

    #[test]
    fn test_unknown_entity_denies() {
        let engine = listing_engine();
        assert_eq!(
            engine.authorize(&Principal::Anonymous, Operation::Read, "Todo", None),
            Decision::Deny
        );
    }

    #[test]
    fn test_later_rule_may_allow_and_carries_field_scope() {
        let registry = Arc::new(Registry::listing());
        let table = PolicyTable::new().with_rules(
            USER,
            vec![
                PolicyRule::identified(Operation::READ).owner_only(),
                PolicyRule::identified(Operation::READ)
                    .with_fields(FieldScope::only(["displayName"])),
            ],
        );
        let engine = PolicyEngine::new(registry, Arc::new(table));
        let record = Record::new("u1").with("displayName", "Ann").with("email", "a@b.c");

        let own = engine.authorize(&Principal::identified("u1"), Operation::Read, USER, Some(&record));
        assert_eq!(own, Decision::Allow(FieldScope::All));

        let other =
            engine.authorize(&Principal::identified("u2"), Operation::Read, USER, Some(&record));
        let scope = other.into_result().unwrap();
        assert!(scope.allows("displayName"));
        assert!(!scope.allows("email"));
        assert!(engine
            .require(&Principal::Anonymous, Operation::Read, USER, Some(&record))
            .is_err());
    }
}
