//! Error types for the dashboard.

use crate::config::ConfigLoadError;
use gestek_core::{AccessError, FieldErrors, FilterError, GestekError, OperationError};
use gestek_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
    #[error(transparent)]
    Grid(#[from] GestekError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("No table selected")]
    NoTableSelected,
    #[error("Row {visual_id} not found in {entity}")]
    RowNotFound { entity: String, visual_id: usize },
    #[error("Reference to {entity} '{id}' does not match any loaded row")]
    DanglingReference { entity: String, id: String },
    #[error("Failed to install tracing subscriber: {0}")]
    Telemetry(String),
}

impl From<AccessError> for DashboardError {
    fn from(err: AccessError) -> Self {
        Self::Grid(err.into())
    }
}

impl From<FilterError> for DashboardError {
    fn from(err: FilterError) -> Self {
        Self::Grid(err.into())
    }
}

impl From<FieldErrors> for DashboardError {
    fn from(err: FieldErrors) -> Self {
        Self::Grid(err.into())
    }
}

impl From<OperationError> for DashboardError {
    fn from(err: OperationError) -> Self {
        Self::Grid(err.into())
    }
}

impl DashboardError {
    /// Per-field messages when this is a validation failure.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Grid(GestekError::Validation(errors)) => Some(errors),
            _ => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::Grid(GestekError::Access(AccessError::PermissionDenied { .. }))
        )
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
