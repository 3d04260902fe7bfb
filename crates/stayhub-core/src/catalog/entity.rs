//! Entity definitions.

use serde::Serialize;

use super::field::FieldDef;

/// Where the owning principal of a record is found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OwnerField {
    /// A named field holds the owner's principal id.
    Field(String),
    /// The record's own id is the owner (account records).
    Identity,
    /// Owned by the platform rather than any single record author.
    Platform,
    /// No owner concept.
    None,
}

/// An entity definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDef {
    /// Entity name (unique within the registry).
    pub name: String,
    /// Field definitions, excluding the implicit `id`.
    pub fields: Vec<FieldDef>,
    /// Owner resolution for owner-scoped policy rules.
    pub owner: OwnerField,
}

impl EntityDef {
    /// Create a new entity definition with no owner.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            owner: OwnerField::None,
        }
    }

    /// Add a field to the entity. Marking a field as owner sets the owner field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        if field.owner {
            self.owner = OwnerField::Field(field.name.clone());
        }
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        for field in fields {
            self = self.with_field(field);
        }
        self
    }

    /// Set the owner resolution explicitly.
    pub fn with_owner(mut self, owner: OwnerField) -> Self {
        self.owner = owner;
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All foreign key fields.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_foreign_key())
    }

    /// All derived fields.
    pub fn derived_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.derived)
    }

    /// Name of the field holding the owner id, if any.
    pub fn owner_field_name(&self) -> Option<&str> {
        match &self.owner {
            OwnerField::Field(name) => Some(name),
            OwnerField::Identity => Some("id"),
            OwnerField::Platform | OwnerField::None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_builder() {
        let entity = EntityDef::new("Rating")
            .with_field(FieldDef::reference("propId", "Property").required())
            .with_field(FieldDef::reference("userId", "User").required().owner())
            .with_field(FieldDef::int("rating"));

        assert_eq!(entity.name, "Rating");
        assert_eq!(entity.fields.len(), 3);
        assert_eq!(entity.owner, OwnerField::Field("userId".into()));
        assert_eq!(entity.owner_field_name(), Some("userId"));
        assert_eq!(entity.foreign_keys().count(), 2);
    }

    #[test]
    fn test_get_field() {
        let entity = EntityDef::new("Image").with_field(FieldDef::string("fileName"));

        assert!(entity.get_field("fileName").is_some());
        assert!(entity.get_field("nonexistent").is_none());
    }

    #[test]
    fn test_identity_owner() {
        let entity = EntityDef::new("User").with_owner(OwnerField::Identity);
        assert_eq!(entity.owner_field_name(), Some("id"));

        let master = EntityDef::new("MasterAmenity").with_owner(OwnerField::Platform);
        assert_eq!(master.owner_field_name(), None);
    }
}
