//! Foreign-key verification and delete planning.

use std::collections::HashSet;
use std::sync::Arc;

use super::cascade::CascadeConfig;
use crate::catalog::{DeleteBehavior, Registry};
use crate::error::Error;
use crate::record::{Record, Value};
use crate::storage::{Expect, Storage, Versioned};

/// Maximum cascade depth before a delete is refused.
pub const MAX_CASCADE_DEPTH: usize = 16;

/// Attempts made when clearing a reference races with another writer.
const SET_NULL_ATTEMPTS: usize = 3;

/// A dependent record scheduled for deletion.
#[derive(Debug, Clone)]
pub struct PlannedDelete {
    /// Entity type.
    pub entity: String,
    /// Record as it was when planned.
    pub record: Record,
}

/// A dependent record whose reference is cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNullify {
    /// Entity type.
    pub entity: String,
    /// Record id.
    pub id: String,
    /// Foreign key field to clear.
    pub field: String,
}

/// Everything a delete will touch, computed before any write.
#[derive(Debug, Clone)]
pub struct DeletePlan {
    /// Root entity.
    pub entity: String,
    /// Root record.
    pub root: Record,
    /// Dependents to delete, leaf-first.
    pub deletes: Vec<PlannedDelete>,
    /// References to clear.
    pub nullify: Vec<PlannedNullify>,
}

impl DeletePlan {
    /// Total records affected, including the root.
    pub fn affected_count(&self) -> usize {
        1 + self.deletes.len() + self.nullify.len()
    }

    /// Every record the plan removes, dependents first and the root last.
    pub fn removed(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.deletes
            .iter()
            .map(|d| (d.entity.as_str(), &d.record))
            .chain(std::iter::once((self.entity.as_str(), &self.root)))
    }
}

/// Keeps cross-entity references valid.
///
/// Reference checks are read-then-write: [`verify`](Self::verify) runs before
/// the storage write and [`confirm`](Self::confirm) re-resolves afterwards so
/// a parent deleted in between is caught at commit time.
pub struct IntegrityEnforcer {
    registry: Arc<Registry>,
    storage: Arc<dyn Storage>,
    cascade: CascadeConfig,
}

impl IntegrityEnforcer {
    /// Create an enforcer.
    pub fn new(registry: Arc<Registry>, storage: Arc<dyn Storage>, cascade: CascadeConfig) -> Self {
        Self {
            registry,
            storage,
            cascade,
        }
    }

    /// Get the cascade configuration.
    pub fn cascade(&self) -> &CascadeConfig {
        &self.cascade
    }

    /// Resolve every non-null foreign key of `record`.
    pub fn verify(&self, entity: &str, record: &Record) -> Result<(), Error> {
        self.verify_fields(entity, record, |_| true)
    }

    /// Resolve the foreign keys present in `patch`, reading values from the
    /// merged `record`.
    pub fn verify_patch(&self, entity: &str, record: &Record, patch: &Record) -> Result<(), Error> {
        self.verify_fields(entity, record, |field| patch.fields.contains_key(field))
    }

    /// Re-resolve references after a create.
    pub fn confirm(&self, entity: &str, record: &Record) -> Result<(), Error> {
        self.verify(entity, record).inspect_err(|err| {
            tracing::warn!(entity, id = %record.id, error = %err, "reference vanished during write");
        })
    }

    /// Re-resolve the references an update touched.
    pub fn confirm_patch(&self, entity: &str, record: &Record, patch: &Record) -> Result<(), Error> {
        self.verify_patch(entity, record, patch).inspect_err(|err| {
            tracing::warn!(entity, id = %record.id, error = %err, "reference vanished during update");
        })
    }

    fn verify_fields(
        &self,
        entity: &str,
        record: &Record,
        include: impl Fn(&str) -> bool,
    ) -> Result<(), Error> {
        let def = self.registry.describe(entity)?;

        for field in def.foreign_keys().filter(|f| include(&f.name)) {
            let Some(target) = field.references.as_deref() else {
                continue;
            };
            let target_id = match record.field(&field.name) {
                None => continue,
                Some(Value::String(id)) => id.as_str(),
                Some(other) => {
                    return Err(Error::ReferentialIntegrityViolation {
                        field: field.name.clone(),
                        target_entity: target.to_string(),
                        target_id: other.to_string(),
                    })
                }
            };

            if !self.storage.exists(target, target_id)? {
                return Err(Error::ReferentialIntegrityViolation {
                    field: field.name.clone(),
                    target_entity: target.to_string(),
                    target_id: target_id.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Walk the dependency graph below `(entity, id)`.
    ///
    /// Fails with [`Error::DependentsExist`] on the first restrict hit, so a
    /// refused delete performs no writes at all.
    pub fn plan_delete(&self, entity: &str, id: &str) -> Result<DeletePlan, Error> {
        self.registry.describe(entity)?;
        let root = self
            .storage
            .get(entity, id)?
            .ok_or_else(|| Error::not_found(entity, id))?
            .record;

        let mut plan = DeletePlan {
            entity: entity.to_string(),
            root,
            deletes: Vec::new(),
            nullify: Vec::new(),
        };
        let mut visited = HashSet::new();
        self.plan_recursive(entity, id, &mut plan, &mut visited, 0)?;
        Ok(plan)
    }

    fn plan_recursive(
        &self,
        entity: &str,
        id: &str,
        plan: &mut DeletePlan,
        visited: &mut HashSet<(String, String)>,
        depth: usize,
    ) -> Result<(), Error> {
        if depth > MAX_CASCADE_DEPTH {
            return Err(Error::CascadeTooDeep { depth });
        }
        if !visited.insert((entity.to_string(), id.to_string())) {
            return Ok(());
        }

        for relation in self.registry.relations_to(entity) {
            let field = relation.from_field.as_str();
            let dependents = self.storage.scan_all(&relation.from_entity, &|r: &Record| {
                r.get_str(field) == Some(id)
            })?;
            if dependents.is_empty() {
                continue;
            }

            match self.cascade.behavior_for(relation) {
                DeleteBehavior::Restrict => {
                    tracing::debug!(
                        entity,
                        id,
                        dependent = %relation.from_entity,
                        count = dependents.len(),
                        "delete restricted"
                    );
                    return Err(Error::DependentsExist {
                        entity: entity.to_string(),
                        dependent: relation.from_entity.clone(),
                        count: dependents.len(),
                    });
                }
                DeleteBehavior::Cascade => {
                    for Versioned { record, .. } in dependents {
                        if visited.contains(&(relation.from_entity.clone(), record.id.clone())) {
                            continue;
                        }
                        self.plan_recursive(
                            &relation.from_entity,
                            &record.id,
                            plan,
                            visited,
                            depth + 1,
                        )?;
                        plan.deletes.push(PlannedDelete {
                            entity: relation.from_entity.clone(),
                            record,
                        });
                    }
                }
                DeleteBehavior::SetNull => {
                    for Versioned { record, .. } in dependents {
                        plan.nullify.push(PlannedNullify {
                            entity: relation.from_entity.clone(),
                            id: record.id,
                            field: relation.from_field.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply a plan: clear references, delete dependents leaf-first, then
    /// delete the root.
    ///
    /// Records that disappeared since planning are skipped. Restrict
    /// relations are re-checked right before the root goes, and dependents
    /// that committed after planning are swept once the root is gone.
    pub fn apply(&self, plan: &DeletePlan) -> Result<(), Error> {
        self.apply_at(plan, 0)
    }

    fn apply_at(&self, plan: &DeletePlan, depth: usize) -> Result<(), Error> {
        let deleted: HashSet<(&str, &str)> = plan
            .deletes
            .iter()
            .map(|d| (d.entity.as_str(), d.record.id.as_str()))
            .collect();

        for target in &plan.nullify {
            if deleted.contains(&(target.entity.as_str(), target.id.as_str())) {
                continue;
            }
            self.clear_reference(target)?;
        }

        for planned in &plan.deletes {
            self.storage.delete(&planned.entity, &planned.record.id)?;
        }

        self.ensure_unrestricted(&plan.entity, &plan.root.id)?;
        if !self.storage.delete(&plan.entity, &plan.root.id)? {
            return Err(Error::not_found(&plan.entity, &plan.root.id));
        }

        for (entity, record) in plan.removed() {
            self.sweep_late_dependents(entity, &record.id, depth)?;
        }

        tracing::debug!(
            entity = %plan.entity,
            id = %plan.root.id,
            affected = plan.affected_count(),
            "delete applied"
        );
        Ok(())
    }

    fn ensure_unrestricted(&self, entity: &str, id: &str) -> Result<(), Error> {
        for relation in self.registry.relations_to(entity) {
            if self.cascade.behavior_for(relation) != DeleteBehavior::Restrict {
                continue;
            }
            let field = relation.from_field.as_str();
            let dependents = self.storage.scan_all(&relation.from_entity, &|r: &Record| {
                r.get_str(field) == Some(id)
            })?;
            if !dependents.is_empty() {
                tracing::warn!(
                    entity,
                    id,
                    dependent = %relation.from_entity,
                    "dependent appeared during delete"
                );
                return Err(Error::DependentsExist {
                    entity: entity.to_string(),
                    dependent: relation.from_entity.clone(),
                    count: dependents.len(),
                });
            }
        }
        Ok(())
    }

    /// Apply cascade and set-null policies to dependents of an already
    /// deleted record that were written after the plan was taken.
    fn sweep_late_dependents(&self, entity: &str, id: &str, depth: usize) -> Result<(), Error> {
        if depth > MAX_CASCADE_DEPTH {
            return Err(Error::CascadeTooDeep { depth });
        }

        for relation in self.registry.relations_to(entity) {
            let behavior = self.cascade.behavior_for(relation);
            if behavior == DeleteBehavior::Restrict {
                continue;
            }
            let field = relation.from_field.as_str();
            let late = self.storage.scan_all(&relation.from_entity, &|r: &Record| {
                r.get_str(field) == Some(id)
            })?;

            for Versioned { record, .. } in late {
                tracing::warn!(
                    entity,
                    id,
                    dependent = %relation.from_entity,
                    dependent_id = %record.id,
                    "late dependent swept"
                );
                if behavior == DeleteBehavior::SetNull {
                    self.clear_reference(&PlannedNullify {
                        entity: relation.from_entity.clone(),
                        id: record.id,
                        field: relation.from_field.clone(),
                    })?;
                    continue;
                }
                match self.plan_delete(&relation.from_entity, &record.id) {
                    Ok(plan) => self.apply_at(&plan, depth + 1)?,
                    Err(Error::NotFound { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(())
    }

    fn clear_reference(&self, target: &PlannedNullify) -> Result<(), Error> {
        for _ in 0..SET_NULL_ATTEMPTS {
            let Some(current) = self.storage.get(&target.entity, &target.id)? else {
                return Ok(());
            };
            let mut record = current.record;
            if record.fields.remove(&target.field).is_none() {
                return Ok(());
            }
            match self
                .storage
                .put(&target.entity, &record, Expect::Version(current.version))
            {
                Ok(_) => return Ok(()),
                Err(err) if err.is_conflict() => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Error::Conflict {
            entity: target.entity.clone(),
            id: target.id.clone(),
        })
    }
}
