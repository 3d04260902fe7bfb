//! Relation definitions between entities.

use serde::{Deserialize, Serialize};

/// Behavior when a referenced record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteBehavior {
    /// Delete dependent records.
    Cascade,
    /// Refuse the delete while dependents exist.
    Restrict,
    /// Clear the foreign key on dependent records.
    SetNull,
}

/// A many-to-one reference from a dependent entity to its parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationDef {
    /// Relation name (unique within the registry).
    pub name: String,
    /// Dependent entity holding the foreign key.
    pub from_entity: String,
    /// Foreign key field on the dependent entity.
    pub from_field: String,
    /// Referenced (parent) entity.
    pub to_entity: String,
    /// Default delete behavior, overridable by configuration.
    pub on_delete: DeleteBehavior,
}

impl RelationDef {
    /// Create a relation with restrict semantics.
    pub fn new(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            on_delete: DeleteBehavior::Restrict,
        }
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_defaults_to_restrict() {
        let rel = RelationDef::new("rating_property", "Rating", "propId", "Property");

        assert_eq!(rel.on_delete, DeleteBehavior::Restrict);
        assert_eq!(rel.from_entity, "Rating");
        assert_eq!(rel.to_entity, "Property");
    }

    #[test]
    fn test_with_on_delete() {
        let rel = RelationDef::new("image_property", "Image", "propId", "Property")
            .with_on_delete(DeleteBehavior::Cascade);
        assert_eq!(rel.on_delete, DeleteBehavior::Cascade);
    }
}
