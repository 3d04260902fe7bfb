//! Referential integrity enforcement.
//!
//! Foreign keys are verified before writes and confirmed after them; deletes
//! are planned against the relation graph and the configured cascade policy
//! before anything is removed.

mod cascade;
mod enforcer;

pub use cascade::CascadeConfig;
pub use enforcer::{DeletePlan, IntegrityEnforcer, PlannedDelete, PlannedNullify, MAX_CASCADE_DEPTH};
