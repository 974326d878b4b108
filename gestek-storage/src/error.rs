//! Storage error types

use gestek_core::{EntityName, FetchError, OperationError, PredicateParseError, RawId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityName, id: RawId },

    #[error("No service registered for {entity}")]
    UnknownService { entity: String },

    #[error("{entity} service unavailable: {reason}")]
    Unavailable { entity: EntityName, reason: String },

    #[error("{entity} rejected the request: {reason}")]
    Rejected { entity: EntityName, reason: String },

    #[error("Invalid predicate for {entity}: {source}")]
    InvalidPredicate {
        entity: EntityName,
        #[source]
        source: PredicateParseError,
    },
}

impl StorageError {
    /// Entity the failing request addressed.
    pub fn entity(&self) -> &str {
        match self {
            StorageError::NotFound { entity, .. }
            | StorageError::Unavailable { entity, .. }
            | StorageError::Rejected { entity, .. }
            | StorageError::InvalidPredicate { entity, .. } => entity.as_str(),
            StorageError::UnknownService { entity } => entity,
        }
    }

    /// As a fetch failure, for load paths that degrade to an empty table.
    pub fn into_fetch_error(self) -> FetchError {
        FetchError {
            entity: EntityName::from(self.entity()),
            reason: self.to_string(),
        }
    }

    /// As a failed create/update/delete.
    pub fn into_operation_error(self, action: &str) -> OperationError {
        OperationError {
            entity: EntityName::from(self.entity()),
            action: action.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Result type alias for entity service calls.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StorageError::NotFound {
            entity: EntityName::from("Equipments"),
            id: RawId::new("e9"),
        };
        assert_eq!(err.to_string(), "Equipments e9 not found");
    }

    #[test]
    fn test_into_operation_error_keeps_entity() {
        let err = StorageError::Rejected {
            entity: EntityName::from("Transfers"),
            reason: "forbidden".to_string(),
        }
        .into_operation_error("delete");
        assert_eq!(err.entity, EntityName::from("Transfers"));
        assert_eq!(err.action, "delete");
        assert!(err.reason.contains("forbidden"));
    }
}
