//! Error types for grid operations
//!
//! Schema, fetch and dangling-reference failures are absorbed into degraded
//! state by the callers; validation, permission and operation failures are
//! surfaced. Field validation is a map, not a single error, so each field can
//! be highlighted independently.

use crate::EntityName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Schema lookup errors. Callers degrade to generic string rendering.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown entity: {entity}")]
    UnknownEntity { entity: String },

    #[error("Unknown field {field} on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("Invalid definition for {entity}.{field}: {reason}")]
    InvalidDefinition {
        entity: String,
        field: String,
        reason: String,
    },
}

/// Backend failure while loading one entity collection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Fetch failed for {entity}: {reason}")]
pub struct FetchError {
    pub entity: EntityName,
    pub reason: String,
}

/// Role overlay refusals.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Permission denied for role {role}: {action} on {entity}")]
    PermissionDenied {
        role: String,
        action: String,
        entity: String,
    },

    #[error("Invalid role configuration for {role}: {reason}")]
    InvalidRoleConfig { role: String, reason: String },
}

/// Filter compilation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Malformed filter key: {key}")]
    MalformedKey { key: String },

    #[error("Column {column} on {entity} is not a foreign key")]
    NotForeignKey { entity: String, column: String },
}

/// A create/update/delete that the backend rejected or failed to perform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{action} on {entity} failed: {reason}")]
pub struct OperationError {
    pub entity: EntityName,
    pub action: String,
    pub reason: String,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Per-field validation messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field. A later message for the same field
    /// replaces the earlier one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when no field failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

/// Master error type for all grid errors.
#[derive(Debug, Clone, Error)]
pub enum GestekError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Validation failed: {0}")]
    Validation(#[from] FieldErrors),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for grid operations.
pub type GestekResult<T> = Result<T, GestekError>;

// =============================================================================
// TESTS
// =============================================================================
