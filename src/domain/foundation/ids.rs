//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// User identifier (the primary key of the user record store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Community identifier (the primary key of the community record store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(String);

impl CommunityId {
    /// Creates a new CommunityId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("community_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_non_empty_value() {
        let id = UserId::new("64b7f0c2e1").unwrap();
        assert_eq!(id.as_str(), "64b7f0c2e1");
        assert_eq!(id.to_string(), "64b7f0c2e1");
    }

    #[test]
    fn user_id_rejects_empty_value() {
        assert!(matches!(
            UserId::new(""),
            Err(ValidationError::EmptyField { .. })
        ));
        assert!(UserId::new("   ").is_err());
    }

    #[test]
    fn community_id_rejects_empty_value() {
        assert!(CommunityId::new("").is_err());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CommunityId::new("c-42").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c-42\"");
    }
}
