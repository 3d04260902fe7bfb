//! Entity operation surface.
//!
//! [`EntityService`] is the one entry point callers use: it stamps service
//! fields, authorizes, validates, enforces references, writes, and triggers
//! rating aggregation. Validation and authorization always finish before the
//! storage write, so a rejected request leaves nothing behind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::catalog::{EntityDef, Registry, AMENITY, PROPERTY, RATING, RATING_CONVERSATION};
use crate::config::{AggregationMode, EngineConfig};
use crate::error::Error;
use crate::integrity::IntegrityEnforcer;
use crate::metrics::EngineMetrics;
use crate::query::{ListingService, Page, PropertyFilter};
use crate::rating::{AggregationWorker, RatingAggregator, RatingSummary, RATING_COUNT, RATING_STAR};
use crate::record::{Record, Value};
use crate::security::{Operation, PolicyEngine, PolicyTable, Principal};
use crate::storage::{generate_id, Expect, Storage};

/// Status stamped on new ratings and replies.
const ACTIVE: &str = "active";

/// Fields whose change on a rating affects its property's summary.
const AGGREGATED_FIELDS: [&str; 2] = ["rating", "status"];

/// What a delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    /// Records deleted, including the target.
    pub deleted: usize,
    /// Dependent records whose reference was cleared.
    pub nullified: usize,
}

/// Executes `create`, `read`, `update`, `delete` and `list` for every entity.
pub struct EntityService {
    registry: Arc<Registry>,
    storage: Arc<dyn Storage>,
    policy: Arc<PolicyEngine>,
    integrity: IntegrityEnforcer,
    aggregator: Arc<RatingAggregator>,
    worker: Option<AggregationWorker>,
    listing: ListingService,
    metrics: Arc<EngineMetrics>,
    config: EngineConfig,
}

impl EntityService {
    /// Create a service over the listing directory schema and policies.
    pub fn new(storage: Arc<dyn Storage>, config: EngineConfig) -> Result<Self, Error> {
        Self::with_schema(Registry::listing(), PolicyTable::listing(), storage, config)
    }

    /// Create a service over a custom registry and policy table.
    pub fn with_schema(
        registry: Registry,
        table: PolicyTable,
        storage: Arc<dyn Storage>,
        config: EngineConfig,
    ) -> Result<Self, Error> {
        let registry = Arc::new(registry);
        let metrics = Arc::new(EngineMetrics::new());

        let policy = Arc::new(
            PolicyEngine::new(registry.clone(), Arc::new(table))
                .with_platform_owners(config.platform_owners.iter().cloned()),
        );
        let integrity =
            IntegrityEnforcer::new(registry.clone(), storage.clone(), config.cascade.clone());
        let aggregator = Arc::new(RatingAggregator::new(
            storage.clone(),
            config.active_statuses.clone(),
            config.aggregation.max_conflict_retries,
            metrics.clone(),
        ));
        let worker = match config.aggregation.mode {
            AggregationMode::Inline => None,
            AggregationMode::Background => Some(AggregationWorker::start(
                aggregator.clone(),
                metrics.clone(),
                &config.aggregation,
            )?),
        };
        let listing = ListingService::new(storage.clone(), policy.clone(), config.listing.clone());

        tracing::info!(
            entities = registry.entity_names().len(),
            mode = ?config.aggregation.mode,
            "entity service ready"
        );

        Ok(Self {
            registry,
            storage,
            policy,
            integrity,
            aggregator,
            worker,
            listing,
            metrics,
            config,
        })
    }

    /// Get the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get the metrics.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Describe an entity.
    pub fn describe(&self, entity: &str) -> Result<&EntityDef, Error> {
        self.registry.describe(entity)
    }

    /// Create a record. Returns the stored record as visible to the caller.
    pub fn create(&self, principal: &Principal, entity: &str, input: Record) -> Result<Record, Error> {
        self.metrics.record_operation(Operation::Create);
        let result = self.create_inner(principal, entity, input);
        self.observe(result)
    }

    fn create_inner(&self, principal: &Principal, entity: &str, input: Record) -> Result<Record, Error> {
        self.registry.check_writable(entity, &input, None)?;

        let mut record = input;
        self.stamp(principal, entity, &mut record);

        let scope = self
            .policy
            .require(principal, Operation::Create, entity, Some(&record))?;
        self.registry.validate(entity, &record)?;
        self.integrity.verify(entity, &record)?;

        self.storage.put(entity, &record, Expect::Absent)?;
        if let Err(err) = self.integrity.confirm(entity, &record) {
            self.storage.delete(entity, &record.id)?;
            return Err(err);
        }

        tracing::debug!(entity, id = %record.id, "record created");
        if entity == RATING {
            self.ratings_changed(record.get_str("propId"));
        }
        Ok(scope.redact(&record))
    }

    fn stamp(&self, principal: &Principal, entity: &str, record: &mut Record) {
        if record.id.is_empty() {
            record.id = generate_id();
        }
        match entity {
            PROPERTY => {
                record.set(RATING_STAR, 0.0);
                record.set(RATING_COUNT, 0i64);
            }
            RATING | RATING_CONVERSATION => {
                if !record.has("status") {
                    record.set("status", ACTIVE);
                }
                if !record.has("createdDate") {
                    record.set(
                        "createdDate",
                        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    );
                }
            }
            AMENITY => {
                if let (false, Some(id)) = (record.has("owner"), principal.id()) {
                    record.set("owner", id);
                }
            }
            _ => {}
        }
    }

    /// Read a record by id, redacted for the caller.
    pub fn read(&self, principal: &Principal, entity: &str, id: &str) -> Result<Record, Error> {
        self.metrics.record_operation(Operation::Read);
        let result = self.read_inner(principal, entity, id);
        self.observe(result)
    }

    fn read_inner(&self, principal: &Principal, entity: &str, id: &str) -> Result<Record, Error> {
        self.registry.describe(entity)?;
        let stored = self
            .storage
            .get(entity, id)?
            .ok_or_else(|| Error::not_found(entity, id))?;
        let scope = self
            .policy
            .require(principal, Operation::Read, entity, Some(&stored.record))?;
        Ok(scope.redact(&stored.record))
    }

    /// Apply a patch. Present fields overwrite, explicit nulls clear.
    ///
    /// Lost races on the record are retried against the fresh version up to
    /// the configured bound before surfacing as [`Error::Conflict`].
    pub fn update(
        &self,
        principal: &Principal,
        entity: &str,
        id: &str,
        patch: Record,
    ) -> Result<Record, Error> {
        self.metrics.record_operation(Operation::Update);
        let result = self.update_inner(principal, entity, id, &patch);
        self.observe(result)
    }

    fn update_inner(
        &self,
        principal: &Principal,
        entity: &str,
        id: &str,
        patch: &Record,
    ) -> Result<Record, Error> {
        self.registry.describe(entity)?;
        if !patch.id.is_empty() && patch.id != id {
            return Err(Error::schema(entity, vec!["id".to_string()]));
        }

        for _ in 0..=self.config.aggregation.max_conflict_retries {
            let existing = self
                .storage
                .get(entity, id)?
                .ok_or_else(|| Error::not_found(entity, id))?;
            self.policy
                .require(principal, Operation::Update, entity, Some(&existing.record))?;
            self.registry
                .check_writable(entity, patch, Some(&existing.record))?;

            let mut merged = existing.record.clone();
            merged.merge(patch);
            let scope = self
                .policy
                .require(principal, Operation::Update, entity, Some(&merged))?;
            self.registry.validate(entity, &merged)?;
            self.integrity.verify_patch(entity, &merged, patch)?;

            let version = match self
                .storage
                .put(entity, &merged, Expect::Version(existing.version))
            {
                Ok(version) => version,
                Err(err) if err.is_conflict() => {
                    tracing::debug!(entity, id, "update raced, retrying");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if let Err(err) = self.integrity.confirm_patch(entity, &merged, patch) {
                self.revert(entity, &existing.record, version);
                return Err(err);
            }

            tracing::debug!(entity, id, version, "record updated");
            if entity == RATING && AGGREGATED_FIELDS.iter().any(|f| patch.fields.contains_key(*f)) {
                self.ratings_changed(merged.get_str("propId"));
            }
            return Ok(scope.redact(&merged));
        }

        Err(Error::Conflict {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }

    fn revert(&self, entity: &str, previous: &Record, version: u64) {
        match self.storage.put(entity, previous, Expect::Version(version)) {
            Ok(_) => tracing::info!(entity, id = %previous.id, "update reverted"),
            Err(err) => {
                tracing::warn!(entity, id = %previous.id, error = %err, "failed to revert update")
            }
        }
    }

    /// Delete a record, applying the cascade policy to its dependents.
    pub fn delete(&self, principal: &Principal, entity: &str, id: &str) -> Result<DeleteSummary, Error> {
        self.metrics.record_operation(Operation::Delete);
        let result = self.delete_inner(principal, entity, id);
        self.observe(result)
    }

    fn delete_inner(&self, principal: &Principal, entity: &str, id: &str) -> Result<DeleteSummary, Error> {
        self.registry.describe(entity)?;
        let existing = self
            .storage
            .get(entity, id)?
            .ok_or_else(|| Error::not_found(entity, id))?;
        self.policy
            .require(principal, Operation::Delete, entity, Some(&existing.record))?;

        let plan = self.integrity.plan_delete(entity, id)?;
        self.integrity.apply(&plan)?;
        self.metrics
            .record_cascade((plan.affected_count() - 1) as u64);

        let removed_properties: BTreeSet<&str> = plan
            .removed()
            .filter(|(e, _)| *e == PROPERTY)
            .map(|(_, r)| r.id.as_str())
            .collect();
        let touched: BTreeSet<&str> = plan
            .removed()
            .filter(|(e, _)| *e == RATING)
            .filter_map(|(_, r)| r.get_str("propId"))
            .filter(|p| !removed_properties.contains(p))
            .collect();
        for prop_id in touched {
            self.ratings_changed(Some(prop_id));
        }

        tracing::info!(entity, id, affected = plan.affected_count(), "record deleted");
        Ok(DeleteSummary {
            deleted: plan.deletes.len() + 1,
            nullified: plan.nullify.len(),
        })
    }

    /// List records of an entity matching an equality filter, in id order.
    pub fn list(
        &self,
        principal: &Principal,
        entity: &str,
        filter: &BTreeMap<String, Value>,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<Page, Error> {
        self.metrics.record_operation(Operation::List);
        let result = self
            .listing
            .list(principal, entity, filter, cursor, page_size);
        self.observe(result)
    }

    /// Serve a filtered, ordered page of properties.
    pub fn list_properties(
        &self,
        principal: &Principal,
        filter: &PropertyFilter,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<Page, Error> {
        self.metrics.record_operation(Operation::List);
        let result = self
            .listing
            .list_properties(principal, filter, cursor, page_size);
        self.observe(result)
    }

    /// Recompute a property's rating summary now.
    pub fn recompute(&self, principal: &Principal, prop_id: &str) -> Result<RatingSummary, Error> {
        let result = self.read_inner(principal, PROPERTY, prop_id).and_then(|_| {
            let summary = self.aggregator.recompute(prop_id);
            if summary.is_err() {
                self.metrics.record_recompute_failure();
            }
            summary
        });
        self.observe(result)
    }

    /// Wait for pending background recomputations.
    pub fn flush(&self) {
        if let Some(worker) = &self.worker {
            worker.flush();
        }
    }

    /// Stop the background worker after draining its queue.
    pub fn shutdown(&self) {
        if let Some(worker) = &self.worker {
            worker.stop();
        }
    }

    fn ratings_changed(&self, prop_id: Option<&str>) {
        let Some(prop_id) = prop_id else {
            return;
        };
        match &self.worker {
            Some(worker) => worker.enqueue(prop_id),
            None => match self.aggregator.recompute(prop_id) {
                Ok(_) | Err(Error::NotFound { .. }) => {}
                Err(err) => {
                    self.metrics.record_recompute_failure();
                    tracing::error!(prop_id, error = ?err, "inline recompute failed");
                }
            },
        }
    }

    fn observe<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(err) = &result {
            match err {
                Error::AuthorizationDenied => self.metrics.record_denial(),
                Error::ReferentialIntegrityViolation { .. } => {
                    self.metrics.record_integrity_violation()
                }
                Error::SchemaViolation { .. } => self.metrics.record_schema_violation(),
                _ => {}
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IMAGE, USER};
    use crate::storage::MemoryStorage;

    fn service() -> EntityService {
        EntityService::new(
            Arc::new(MemoryStorage::new()),
            EngineConfig::new().inline_aggregation(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_stamps_service_fields() {
        let svc = service();
        let anon = Principal::Anonymous;

        let property = svc
            .create(&anon, PROPERTY, Record::default().with("title", "Loft"))
            .unwrap();
        assert!(!property.id.is_empty());
        assert_eq!(property.get_f64(RATING_STAR), Some(0.0));
        assert_eq!(property.get_i64(RATING_COUNT), Some(0));

        svc.create(&anon, USER, Record::new("u1")).unwrap();
        let rating = svc
            .create(
                &anon,
                RATING,
                Record::default()
                    .with("propId", property.id.as_str())
                    .with("userId", "u1")
                    .with("rating", 4),
            )
            .unwrap();
        assert_eq!(rating.get_str("status"), Some("active"));
        assert!(rating.has("createdDate"));
    }

    #[test]
    fn test_derived_fields_rejected() {
        let svc = service();
        let err = svc
            .create(
                &Principal::Anonymous,
                PROPERTY,
                Record::default().with("ratingStar", 5.0),
            )
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { ref fields, .. } if fields == &["ratingStar"]));
        assert_eq!(svc.metrics().snapshot().schema_violations, 1);
    }

    #[test]
    fn test_amenity_owner_stamped_and_enforced() {
        let svc = service();
        let host = Principal::identified("host");
        let p = svc.create(&host, PROPERTY, Record::default()).unwrap();

        let amenity = svc
            .create(
                &host,
                AMENITY,
                Record::default().with("propId", p.id.as_str()).with("name", "Pool"),
            )
            .unwrap();
        assert_eq!(amenity.get_str("owner"), Some("host"));

        let guest = Principal::identified("guest");
        let patch = Record::default().with("name", "Spa");
        assert!(matches!(
            svc.update(&guest, AMENITY, &amenity.id, patch.clone()),
            Err(Error::AuthorizationDenied)
        ));
        svc.update(&host, AMENITY, &amenity.id, patch).unwrap();

        let steal = Record::default().with("owner", "guest");
        assert!(svc.update(&host, AMENITY, &amenity.id, steal).is_err());
    }

    #[test]
    fn test_update_missing_and_id_mismatch() {
        let svc = service();
        let anon = Principal::Anonymous;
        assert!(matches!(
            svc.update(&anon, IMAGE, "nope", Record::default()),
            Err(Error::NotFound { .. })
        ));

        let p = svc.create(&anon, PROPERTY, Record::default()).unwrap();
        assert!(matches!(
            svc.update(&anon, PROPERTY, &p.id, Record::new("other")),
            Err(Error::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_delete_reports_cascade() {
        let svc = service();
        let anon = Principal::Anonymous;
        let p = svc.create(&anon, PROPERTY, Record::default()).unwrap();
        for _ in 0..2 {
            svc.create(&anon, IMAGE, Record::default().with("propId", p.id.as_str()))
                .unwrap();
        }

        let summary = svc.delete(&anon, PROPERTY, &p.id).unwrap();
        assert_eq!(summary, DeleteSummary { deleted: 3, nullified: 0 });
        assert_eq!(svc.metrics().snapshot().cascaded_records, 2);
        assert!(matches!(
            svc.read(&anon, PROPERTY, &p.id),
            Err(Error::NotFound { .. })
        ));
    }
}
