//! Grid configuration types

use crate::enums::Role;
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Where a table's columns come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStrategy {
    /// Registered schema fields, falling back to record keys for unknown
    /// entities.
    #[default]
    SchemaFirst,
    /// Keys of the first record in the batch.
    FirstRecord,
}

/// How `visualId` labels are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualIdOrder {
    /// Dense 1..N in the order the backend returned rows. Labels shift when
    /// the backend reorders.
    #[default]
    BackendOrder,
    /// Rows are sorted by raw primary key before numbering, so labels stay
    /// put across reloads as long as the row set does not change.
    PrimaryKey,
}

/// Grid behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub default_page_size: usize,
    pub page_size_options: Vec<usize>,
    pub column_strategy: ColumnStrategy,
    pub visual_id_order: VisualIdOrder,
    /// Role used when the session role string is not recognized.
    pub fallback_role: Role,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            page_size_options: vec![5, 10, 25, 50],
            column_strategy: ColumnStrategy::SchemaFirst,
            visual_id_order: VisualIdOrder::BackendOrder,
            fallback_role: Role::Employee,
        }
    }
}

impl GridConfig {
    /// Validates:
    /// - default_page_size > 0
    /// - every page size option > 0
    /// - default_page_size is one of the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size".to_string(),
                value: self.default_page_size.to_string(),
                reason: "default_page_size must be greater than 0".to_string(),
            });
        }

        if let Some(zero) = self.page_size_options.iter().find(|size| **size == 0) {
            return Err(ConfigError::InvalidValue {
                field: "page_size_options".to_string(),
                value: zero.to_string(),
                reason: "page sizes must be greater than 0".to_string(),
            });
        }

        if !self.page_size_options.contains(&self.default_page_size) {
            return Err(ConfigError::IncompatibleOptions {
                option_a: format!("default_page_size = {}", self.default_page_size),
                option_b: format!("page_size_options = {:?}", self.page_size_options),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GridConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.column_strategy, ColumnStrategy::SchemaFirst);
        assert_eq!(config.visual_id_order, VisualIdOrder::BackendOrder);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = GridConfig {
            default_page_size: 0,
            ..GridConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "default_page_size"
        ));
    }

    #[test]
    fn test_default_must_be_an_option() {
        let config = GridConfig {
            default_page_size: 7,
            ..GridConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompatibleOptions { .. })
        ));
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: GridConfig =
            serde_json::from_str(r#"{"visual_id_order": "primary_key"}"#).unwrap();
        assert_eq!(config.visual_id_order, VisualIdOrder::PrimaryKey);
        assert_eq!(config.page_size_options, vec![5, 10, 25, 50]);
    }
}
