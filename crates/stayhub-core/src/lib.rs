//! Stayhub Core - execution engine for the listing directory.
//!
//! The crate turns a declarative entity schema into enforced behavior:
//! ordered authorization policies, referential integrity with configurable
//! delete cascades, and rating summaries kept consistent with their ratings.
//! Storage is an external collaborator behind the [`Storage`] trait.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod config;
pub mod error;
pub mod integrity;
pub mod metrics;
pub mod query;
pub mod rating;
pub mod record;
pub mod security;
pub mod service;
pub mod storage;

pub use catalog::{
    DeleteBehavior, EntityDef, FieldDef, OwnerField, Registry, RelationDef, ScalarType,
};
pub use config::{AggregationConfig, AggregationMode, EngineConfig, ListingConfig};
pub use error::Error;
pub use integrity::{CascadeConfig, DeletePlan, IntegrityEnforcer};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use query::{GeoRadius, ListingService, OrderBy, Page, PropertyFilter, SortDirection};
pub use rating::{AggregationWorker, RatingAggregator, RatingSummary};
pub use record::{Record, Value};
pub use security::{
    Decision, FieldScope, Operation, PolicyEngine, PolicyRule, PolicyTable, Principal,
    PrincipalClass, RecordScope,
};
pub use service::{DeleteSummary, EntityService};
pub use storage::{Expect, MemoryStorage, ScanPage, SledStorage, Storage, Versioned};
