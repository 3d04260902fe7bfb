//! Authorization policy engine.
//!
//! Every entity carries an ordered list of [`PolicyRule`]s. The
//! [`PolicyEngine`] interprets them for a `(principal, operation, entity,
//! record)` tuple and returns a [`Decision`], optionally narrowing the visible
//! field set for field redaction.

mod engine;
mod policy;
mod principal;

pub use engine::{Decision, PolicyEngine};
pub use policy::{FieldScope, Operation, PolicyRule, PolicyTable, RecordScope};
pub use principal::{Principal, PrincipalClass};
