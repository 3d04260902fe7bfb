//! Delete-cascade policy configuration.

use std::collections::HashMap;

use crate::catalog::{DeleteBehavior, RelationDef};

/// Per-dependent delete behavior, overriding the registry defaults.
///
/// Keys are `(parent entity, dependent entity)` pairs so a dependent that
/// references several parents can carry a different policy for each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeConfig {
    overrides: HashMap<(String, String), DeleteBehavior>,
}

impl CascadeConfig {
    /// Use registry defaults everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the behavior when a `parent` with `dependent` records is deleted.
    pub fn with_policy(
        mut self,
        parent: impl Into<String>,
        dependent: impl Into<String>,
        behavior: DeleteBehavior,
    ) -> Self {
        self.overrides
            .insert((parent.into(), dependent.into()), behavior);
        self
    }

    /// Effective behavior for a relation.
    pub fn behavior_for(&self, relation: &RelationDef) -> DeleteBehavior {
        self.overrides
            .get(&(relation.to_entity.clone(), relation.from_entity.clone()))
            .copied()
            .unwrap_or(relation.on_delete)
    }

    /// Number of configured overrides.
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Check if no overrides are configured.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Registry, PROPERTY, RATING};

    #[test]
    fn test_defaults_come_from_registry() {
        let registry = Registry::listing();
        let relation = registry.get_relation("rating_property").unwrap();
        assert_eq!(
            CascadeConfig::new().behavior_for(relation),
            DeleteBehavior::Restrict
        );
    }

    #[test]
    fn test_override() {
        let registry = Registry::listing();
        let config = CascadeConfig::new().with_policy(PROPERTY, RATING, DeleteBehavior::Cascade);

        let relation = registry.get_relation("rating_property").unwrap();
        assert_eq!(config.behavior_for(relation), DeleteBehavior::Cascade);

        let author = registry.get_relation("rating_author").unwrap();
        assert_eq!(config.behavior_for(author), DeleteBehavior::Restrict);
        assert_eq!(config.len(), 1);
    }
}
