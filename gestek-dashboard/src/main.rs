//! GesTecK dashboard entry point.
//!
//! Loads the config, installs tracing and prints the tables the session
//! role would see. Services are in-memory and start empty.

use gestek_core::{Session, SCHEMA};
use gestek_dashboard::{init_tracing, Dashboard, DashboardConfig, DashboardError};
use gestek_storage::{InMemoryEntityService, ServiceRegistry};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), DashboardError> {
    let config = DashboardConfig::load_or_default()?;
    init_tracing(&config.logging)?;

    let role = std::env::var("GESTEK_ROLE").unwrap_or_else(|_| "Administrator".to_string());
    let session = Session::new("local", "Local User", role);

    let mut services = ServiceRegistry::new();
    for entity in SCHEMA.entity_names() {
        services.register(Arc::new(InMemoryEntityService::new(entity)));
    }

    let mut dashboard = Dashboard::new(session, services, &config)?;
    dashboard.load().await;

    println!("{}", dashboard.title());
    for table in dashboard.visible_tables() {
        let marker = if dashboard.is_table_read_only(table.name.as_str()) {
            " (read-only)"
        } else {
            ""
        };
        println!("  {}: {} rows{}", table.name, table.len(), marker);
    }
    for notification in dashboard.errors().iter() {
        eprintln!("{:?}: {}", notification.level, notification.message);
    }
    Ok(())
}
