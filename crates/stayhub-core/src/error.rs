//! Core error types.

use thiserror::Error;

/// Errors surfaced by every entity operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry lookup miss.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Client input failed a type or shape check.
    #[error("schema violation on {entity}: {}", fields.join(", "))]
    SchemaViolation {
        /// Entity being written.
        entity: String,
        /// Fields at fault.
        fields: Vec<String>,
    },

    /// The policy engine refused the request.
    #[error("authorization denied")]
    AuthorizationDenied,

    /// A foreign key does not resolve.
    #[error("referential integrity violation: {field} references missing {target_entity} '{target_id}'")]
    ReferentialIntegrityViolation {
        /// Foreign key field.
        field: String,
        /// Referenced entity.
        target_entity: String,
        /// Referenced id that could not be resolved.
        target_id: String,
    },

    /// A delete was blocked by a restrict policy.
    #[error("cannot delete {entity}: {count} dependent {dependent} record(s) exist")]
    DependentsExist {
        /// Entity being deleted.
        entity: String,
        /// Dependent entity type holding references.
        dependent: String,
        /// Number of dependents found.
        count: usize,
    },

    /// A delete cascade nested past the depth limit.
    #[error("cascade depth limit {depth} exceeded")]
    CascadeTooDeep {
        /// Depth reached.
        depth: usize,
    },

    /// Target record absent.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity name.
        entity: String,
        /// Record id.
        id: String,
    },

    /// A concurrent modification won the race and retries were exhausted.
    #[error("conflicting concurrent update on {entity} '{id}'")]
    Conflict {
        /// Entity name.
        entity: String,
        /// Record id.
        id: String,
    },

    /// Transient storage failure.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Record encoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Sled storage error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
}

impl Error {
    /// Shorthand for a schema violation on a set of fields.
    pub fn schema(entity: impl Into<String>, fields: Vec<String>) -> Self {
        Error::SchemaViolation {
            entity: entity.into(),
            fields,
        }
    }

    /// Shorthand for a missing record.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Check if this is a storage-level compare-and-set conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::schema("Amenity", vec!["propId".into(), "amount".into()]);
        assert_eq!(err.to_string(), "schema violation on Amenity: propId, amount");

        let err = Error::ReferentialIntegrityViolation {
            field: "propId".into(),
            target_entity: "Property".into(),
            target_id: "p-1".into(),
        };
        assert!(err.to_string().contains("missing Property 'p-1'"));
    }

    #[test]
    fn test_denied_is_uniform() {
        assert_eq!(Error::AuthorizationDenied.to_string(), "authorization denied");
    }
}
