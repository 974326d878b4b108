//! GesTecK Dashboard
//!
//! Session-bound dashboard state over the grid engine: concurrent loading,
//! table selection, client and server filtering, paging, role-gated CRUD and
//! a dismissible error list. Configuration comes from TOML; logging goes
//! through `tracing`.

pub mod config;
pub mod error;
pub mod loader;
pub mod notifications;
pub mod state;
pub mod telemetry;

pub use config::{ConfigLoadError, DashboardConfig, LoggingConfig};
pub use error::{DashboardError, DashboardResult};
pub use loader::{load_tables, reload_entity, LoadOutcome};
pub use notifications::{ErrorList, Notification, NotificationLevel};
pub use state::Dashboard;
pub use telemetry::init_tracing;
