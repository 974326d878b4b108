//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use crate::error::{DashboardError, DashboardResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the configured filter directive.
pub const LOG_ENV: &str = "GESTEK_LOG";

/// Filter from `GESTEK_LOG`, else the configured directive.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.directive))
}

/// Install the global subscriber. A second call returns an error.
pub fn init_tracing(config: &LoggingConfig) -> DashboardResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| DashboardError::Telemetry(e.to_string()))?;

    tracing::info!(json = config.json, directive = %config.directive, "Tracing initialized");
    Ok(())
}
