//! Caller identity as supplied by the authentication collaborator.

use std::fmt;

/// A verified caller descriptor. The engine trusts it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    /// Unauthenticated caller (public API key).
    Anonymous,
    /// Caller carrying an account id.
    Identified {
        /// Account id, compared against record owner fields.
        id: String,
    },
}

/// Principal class a policy rule binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalClass {
    /// Matches anonymous callers.
    Anonymous,
    /// Matches identified callers.
    Identified,
}

impl Principal {
    /// Create an identified principal.
    pub fn identified(id: impl Into<String>) -> Self {
        Principal::Identified { id: id.into() }
    }

    /// The class used for rule matching.
    pub fn class(&self) -> PrincipalClass {
        match self {
            Principal::Anonymous => PrincipalClass::Anonymous,
            Principal::Identified { .. } => PrincipalClass::Identified,
        }
    }

    /// Account id, if identified.
    pub fn id(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::Identified { id } => Some(id),
        }
    }

    /// Check if the caller carries an identity.
    pub fn is_identified(&self) -> bool {
        matches!(self, Principal::Identified { .. })
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Anonymous => write!(f, "anonymous"),
            Principal::Identified { id } => write!(f, "user:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_class() {
        assert_eq!(Principal::Anonymous.class(), PrincipalClass::Anonymous);
        assert_eq!(
            Principal::identified("u1").class(),
            PrincipalClass::Identified
        );
        assert_eq!(Principal::identified("u1").id(), Some("u1"));
        assert_eq!(Principal::Anonymous.id(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Principal::Anonymous.to_string(), "anonymous");
        assert_eq!(Principal::identified("u7").to_string(), "user:u7");
    }
}
