//! Concurrent table loading.
//!
//! A full load fetches every entity at once and resolves foreign keys only
//! after all fetches have finished. A failed fetch leaves an empty table for
//! its entity and is reported back; the rest of the batch is unaffected.

use futures_util::future::join_all;
use gestek_core::{EntityName, FetchError, Record, TableSet};
use gestek_grid::{resolve_with, Materializer, ResolutionContext, ResolutionSummary};
use gestek_storage::ServiceRegistry;
use tracing::{debug, info, warn};

/// Tables from one load plus the fetches that failed.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub tables: TableSet,
    pub failures: Vec<FetchError>,
    pub summary: ResolutionSummary,
}

/// Session-scoped records of one entity.
pub async fn fetch_entity(
    services: &ServiceRegistry,
    entity: &EntityName,
) -> Result<Vec<Record>, FetchError> {
    let service = services
        .require(entity.as_str())
        .map_err(|e| e.into_fetch_error())?;
    service.get().await.map_err(|e| e.into_fetch_error())
}

/// Role-unscoped records of one entity.
pub async fn fetch_all(
    services: &ServiceRegistry,
    entity: &str,
) -> Result<Vec<Record>, FetchError> {
    let service = services.require(entity).map_err(|e| e.into_fetch_error())?;
    service.get_all().await.map_err(|e| e.into_fetch_error())
}

/// Fetch, materialize and resolve `entities` as one batch.
pub async fn load_tables(
    services: &ServiceRegistry,
    materializer: &Materializer<'_>,
    entities: &[EntityName],
) -> LoadOutcome {
    let fetches = entities.iter().map(|entity| async move {
        let result = fetch_entity(services, entity).await;
        (entity, result)
    });
    let results = join_all(fetches).await;

    let mut outcome = LoadOutcome::default();
    for (entity, result) in results {
        let records = match result {
            Ok(records) => records,
            Err(error) => {
                warn!(entity = %entity, error = %error, "fetch failed, showing empty table");
                outcome.failures.push(error);
                Vec::new()
            }
        };
        debug!(entity = %entity, rows = records.len(), "fetched");
        outcome
            .tables
            .insert(materializer.materialize(entity.as_str(), &records));
    }

    let context = ResolutionContext::build(&outcome.tables);
    outcome.summary = resolve_with(&mut outcome.tables, &context);
    info!(
        tables = outcome.tables.len(),
        failed = outcome.failures.len(),
        resolved = outcome.summary.resolved,
        dangling = outcome.summary.dangling,
        "load complete"
    );
    outcome
}

/// Re-fetch one entity into `tables` and re-resolve the whole set.
///
/// On failure the entity's table is emptied and the error returned; the
/// set is still re-resolved so references into it become dangling.
pub async fn reload_entity(
    services: &ServiceRegistry,
    materializer: &Materializer<'_>,
    tables: &mut TableSet,
    entity: &EntityName,
) -> Result<ResolutionSummary, FetchError> {
    let result = fetch_entity(services, entity).await;
    let records: &[Record] = match &result {
        Ok(records) => records,
        Err(error) => {
            warn!(entity = %entity, error = %error, "reload failed, showing empty table");
            &[]
        }
    };
    tables.insert(materializer.materialize(entity.as_str(), records));

    let context = ResolutionContext::build(tables);
    let summary = resolve_with(tables, &context);
    debug!(entity = %entity, resolved = summary.resolved, dangling = summary.dangling, "reloaded");
    result.map(|_| summary)
}
