//! Field definitions for entities.

use serde::Serialize;

use super::types::ScalarType;

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub scalar: ScalarType,
    /// Whether null or absent values are accepted.
    pub nullable: bool,
    /// Entity this field references, if it is a foreign key.
    pub references: Option<String>,
    /// Whether this field identifies the owning principal.
    pub owner: bool,
    /// Derived fields are maintained by the engine and never client-set.
    pub derived: bool,
    /// Immutable fields cannot change once the record exists.
    pub immutable: bool,
    /// Inclusive integer range, if constrained.
    pub range: Option<(i64, i64)>,
}

impl FieldDef {
    /// Create a nullable field.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            nullable: true,
            references: None,
            owner: false,
            derived: false,
            immutable: false,
            range: None,
        }
    }

    /// Nullable string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::String)
    }

    /// Nullable integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Int)
    }

    /// Nullable float field.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Float)
    }

    /// Nullable boolean field.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Bool)
    }

    /// String foreign key to `target`. Optional until marked `required`.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut field = Self::string(name);
        field.references = Some(target.into());
        field
    }

    /// Mark as required (non-null, non-empty).
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as the owner-identifying field.
    pub fn owner(mut self) -> Self {
        self.owner = true;
        self
    }

    /// Mark as derived.
    pub fn derived(mut self) -> Self {
        self.derived = true;
        self
    }

    /// Mark as immutable after create.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Constrain an integer field to an inclusive range.
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Check if this field is a foreign key.
    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }
}
