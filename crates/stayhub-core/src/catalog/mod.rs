//! Entity registry for the listing directory.
//!
//! The registry stores entity definitions, field metadata and the relations
//! between entities. It is built once and passed explicitly to every
//! component that needs it.

mod entity;
mod field;
mod registry;
mod relation;
mod schema;
mod types;

pub use entity::{EntityDef, OwnerField};
pub use field::FieldDef;
pub use registry::Registry;
pub use relation::{DeleteBehavior, RelationDef};
pub use schema::*;
pub use types::ScalarType;
