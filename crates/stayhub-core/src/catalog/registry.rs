//! Entity registry: the immutable catalog every component consults.

use std::collections::{BTreeSet, HashMap};

use super::{EntityDef, RelationDef};
use crate::error::Error;
use crate::record::{Record, Value};

/// Immutable catalog of entity and relation definitions.
///
/// Built once at start-up and shared by reference (or `Arc`). All methods are
/// pure and never touch storage.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: HashMap<String, EntityDef>,
    relations: Vec<RelationDef>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Look up an entity definition.
    pub fn describe(&self, entity: &str) -> Result<&EntityDef, Error> {
        self.entities
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    /// Check if an entity is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Registered entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All relations.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Relations where `entity` is the dependent side.
    pub fn relations_from(&self, entity: &str) -> Vec<&RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.from_entity == entity)
            .collect()
    }

    /// Relations where `entity` is the referenced parent.
    pub fn relations_to(&self, entity: &str) -> Vec<&RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.to_entity == entity)
            .collect()
    }

    /// Validate a full record against its entity definition.
    ///
    /// Checks unknown fields, type conformance, integer ranges, and that
    /// required fields (mandatory foreign keys included) are present and
    /// non-empty.
    pub fn validate(&self, entity: &str, record: &Record) -> Result<(), Error> {
        let def = self.describe(entity)?;
        let mut faults = BTreeSet::new();

        for (name, value) in &record.fields {
            let Some(field) = def.get_field(name) else {
                faults.insert(name.clone());
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !field.scalar.accepts(value) {
                faults.insert(name.clone());
                continue;
            }
            if let (Some((min, max)), Value::Int(v)) = (field.range, value) {
                if *v < min || *v > max {
                    faults.insert(name.clone());
                }
            }
        }

        for field in def.fields.iter().filter(|f| !f.nullable) {
            let present = match record.field(&field.name) {
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
                None => false,
            };
            if !present {
                faults.insert(field.name.clone());
            }
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(Error::schema(entity, faults.into_iter().collect()))
        }
    }

    /// Check that client input does not write derived fields and, for
    /// updates, does not change immutable ones.
    pub fn check_writable(
        &self,
        entity: &str,
        input: &Record,
        existing: Option<&Record>,
    ) -> Result<(), Error> {
        let def = self.describe(entity)?;
        let mut faults = BTreeSet::new();

        for field in def.derived_fields() {
            if input.fields.contains_key(&field.name) {
                faults.insert(field.name.clone());
            }
        }

        if let Some(existing) = existing {
            for field in def.fields.iter().filter(|f| f.immutable) {
                if let Some(new_value) = input.fields.get(&field.name) {
                    if existing.fields.get(&field.name) != Some(new_value) {
                        faults.insert(field.name.clone());
                    }
                }
            }
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(Error::schema(entity, faults.into_iter().collect()))
        }
    }
}
