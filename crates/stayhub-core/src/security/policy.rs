//! Policy rule definitions and the per-entity rule table.
//!
//! Each entity carries an ordered list of rules. Rules are plain data; the
//! single interpreter lives in [`super::PolicyEngine`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::principal::PrincipalClass;
use crate::catalog::{
    AMENITY, IMAGE, MASTER_AMENITY, MASTER_AMENITY_USAGE_TYPE, MASTER_STAY_PLAN, NEAR_BY,
    PROPERTY, RATING, RATING_CONVERSATION, STAY_PLAN, USER,
};
use crate::record::Record;

/// Entity operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// Create a record.
    Create,
    /// Read a single record.
    Read,
    /// Update a record.
    Update,
    /// Delete a record.
    Delete,
    /// List records.
    List,
}

impl Operation {
    /// All five operations.
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::List,
    ];

    /// Read-side operations.
    pub const READ: [Operation; 2] = [Operation::Read, Operation::List];

    /// Mutating operations.
    pub const WRITE: [Operation; 3] = [Operation::Create, Operation::Update, Operation::Delete];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        };
        f.write_str(name)
    }
}

/// Fields a granted rule exposes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldScope {
    /// Every field.
    #[default]
    All,
    /// Only the named fields (the id is always kept).
    Only(BTreeSet<String>),
}

impl FieldScope {
    /// Build a subset scope.
    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldScope::Only(fields.into_iter().map(Into::into).collect())
    }

    /// Check if a field is visible under this scope.
    pub fn allows(&self, field: &str) -> bool {
        match self {
            FieldScope::All => true,
            FieldScope::Only(fields) => field == "id" || fields.contains(field),
        }
    }

    /// Strip fields outside the scope.
    pub fn redact(&self, record: &Record) -> Record {
        match self {
            FieldScope::All => record.clone(),
            FieldScope::Only(_) => Record {
                id: record.id.clone(),
                fields: record
                    .fields
                    .iter()
                    .filter(|(name, _)| self.allows(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            },
        }
    }
}

/// Which records a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordScope {
    /// Any record.
    #[default]
    Any,
    /// Only records whose owner is the calling principal.
    OwnerOnly,
}

/// A single permission-granting rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    /// Principal class the rule binds to.
    pub principal: PrincipalClass,
    /// Operations granted.
    pub operations: BTreeSet<Operation>,
    /// Visible fields when granted.
    pub fields: FieldScope,
    /// Record-ownership condition.
    pub records: RecordScope,
}

impl PolicyRule {
    /// Create a rule for a principal class over a set of operations.
    pub fn new(principal: PrincipalClass, operations: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            principal,
            operations: operations.into_iter().collect(),
            fields: FieldScope::All,
            records: RecordScope::Any,
        }
    }

    /// Rule for anonymous callers.
    pub fn anonymous(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self::new(PrincipalClass::Anonymous, operations)
    }

    /// Rule for identified callers.
    pub fn identified(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self::new(PrincipalClass::Identified, operations)
    }

    /// Restrict to records owned by the caller.
    pub fn owner_only(mut self) -> Self {
        self.records = RecordScope::OwnerOnly;
        self
    }

    /// Restrict visible fields.
    pub fn with_fields(mut self, fields: FieldScope) -> Self {
        self.fields = fields;
        self
    }

    /// Check if this rule covers the operation and principal class.
    pub fn applies_to(&self, operation: Operation, class: PrincipalClass) -> bool {
        self.principal == class && self.operations.contains(&operation)
    }
}

/// Ordered policy rules keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    rules: HashMap<String, Vec<PolicyRule>>,
}

impl PolicyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ordered rules for an entity.
    pub fn with_rules(mut self, entity: impl Into<String>, rules: Vec<PolicyRule>) -> Self {
        self.rules.insert(entity.into(), rules);
        self
    }

    /// Rules for an entity, in declaration order. Unknown entities have none.
    pub fn rules_for(&self, entity: &str) -> &[PolicyRule] {
        self.rules.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fully public: every operation for both principal classes.
    pub fn public_rules() -> Vec<PolicyRule> {
        vec![
            PolicyRule::anonymous(Operation::ALL),
            PolicyRule::identified(Operation::ALL),
        ]
    }

    /// Public read, owner write.
    pub fn public_read_owner_write_rules() -> Vec<PolicyRule> {
        vec![
            PolicyRule::anonymous(Operation::READ),
            PolicyRule::identified(Operation::READ),
            PolicyRule::identified(Operation::WRITE).owner_only(),
        ]
    }

    /// Build the table for the listing directory.
    pub fn listing() -> Self {
        let mut table = Self::new();
        for entity in [PROPERTY, IMAGE, NEAR_BY, USER, RATING, RATING_CONVERSATION, STAY_PLAN] {
            table = table.with_rules(entity, Self::public_rules());
        }
        for entity in [AMENITY, MASTER_AMENITY, MASTER_AMENITY_USAGE_TYPE, MASTER_STAY_PLAN] {
            table = table.with_rules(entity, Self::public_read_owner_write_rules());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_applies_to() {
        let rule = PolicyRule::anonymous(Operation::READ);
        assert!(rule.applies_to(Operation::Read, PrincipalClass::Anonymous));
        assert!(rule.applies_to(Operation::List, PrincipalClass::Anonymous));
        assert!(!rule.applies_to(Operation::Create, PrincipalClass::Anonymous));
        assert!(!rule.applies_to(Operation::Read, PrincipalClass::Identified));
    }

    #[test]
    fn test_field_scope_redact() {
        let record = Record::new("u1")
            .with("displayName", "Ann")
            .with("email", "ann@example.com");
        let scope = FieldScope::only(["displayName"]);

        let redacted = scope.redact(&record);
        assert_eq!(redacted.id, "u1");
        assert_eq!(redacted.get_str("displayName"), Some("Ann"));
        assert!(redacted.get("email").is_none());

        assert_eq!(FieldScope::All.redact(&record), record);
    }

    #[test]
    fn test_listing_table_shapes() {
        let table = PolicyTable::listing();
        assert_eq!(table.rules_for(PROPERTY).len(), 2);
        assert_eq!(table.rules_for(AMENITY).len(), 3);
        assert_eq!(table.rules_for(AMENITY)[2].records, RecordScope::OwnerOnly);
        assert!(table.rules_for("Todo").is_empty());
    }
}
