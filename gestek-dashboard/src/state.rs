//! Dashboard state.
//!
//! Holds the session, the loaded table set and the grid view, and routes
//! every create/update/delete through the role overlay before the backend
//! sees it. Backend failures land in the error list; nothing is retried.

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::loader::{self, fetch_all};
use crate::notifications::ErrorList;
use gestek_core::{
    AccessError, AccessMatrix, EntityName, GridConfig, RawId, Record, Row, SchemaRegistry,
    Session, Table, TableSet,
};
use gestek_grid::form::{self, FkOption, FormValues};
use gestek_grid::{
    matching_ids, total_pages, FilterEngine, FilterSet, GridPage, GridView, Materializer,
    ServerFilter,
};
use gestek_storage::ServiceRegistry;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Rows returned by the last server-side filter, plus the filters the
/// backend could not evaluate.
#[derive(Debug, Clone)]
struct ServerResult {
    table: Table,
    local: FilterSet,
}

#[derive(Debug)]
pub struct Dashboard {
    session: Session,
    schema: SchemaRegistry,
    access: AccessMatrix,
    config: GridConfig,
    services: ServiceRegistry,
    tables: TableSet,
    view: GridView,
    server: Option<ServerResult>,
    errors: ErrorList,
}

impl Dashboard {
    /// Build a dashboard from a loaded config. Tables are empty until
    /// [`Dashboard::load`].
    pub fn new(
        session: Session,
        services: ServiceRegistry,
        config: &DashboardConfig,
    ) -> DashboardResult<Self> {
        let access = config
            .access_matrix()
            .map_err(|e| DashboardError::Config(e.into()))?;
        Ok(Self::with_parts(
            session,
            SchemaRegistry::builtin(),
            access,
            config.grid.clone(),
            services,
        ))
    }

    pub fn with_parts(
        session: Session,
        schema: SchemaRegistry,
        access: AccessMatrix,
        config: GridConfig,
        services: ServiceRegistry,
    ) -> Self {
        let view = GridView::new(config.default_page_size);
        Self {
            session,
            schema,
            access,
            config,
            services,
            tables: TableSet::new(),
            view,
            server: None,
            errors: ErrorList::new(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn role(&self) -> &str {
        &self.session.role
    }

    pub fn title(&self) -> &str {
        &self.access.role_config(self.role()).dashboard_title
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    pub fn view(&self) -> &GridView {
        &self.view
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    pub fn dismiss_error(&mut self, id: u64) -> bool {
        self.errors.dismiss(id)
    }

    pub fn can_export_reports(&self) -> bool {
        self.access.can_export_reports(self.role())
    }

    /// Tables the role may see, in its configured order.
    pub fn visible_tables(&self) -> Vec<&Table> {
        gestek_grid::visible_tables(&self.tables, &self.access, self.role())
    }

    /// Currently selected table.
    pub fn current_table(&self) -> Option<&Table> {
        self.view.entity().and_then(|e| self.tables.get(e.as_str()))
    }

    pub fn is_table_read_only(&self, entity: &str) -> bool {
        self.access.is_table_read_only(self.role(), entity)
    }

    /// Whether the selected table is shown without create/edit/delete.
    pub fn is_read_only(&self) -> bool {
        match self.view.entity() {
            Some(entity) => self.is_table_read_only(entity.as_str()),
            None => true,
        }
    }

    /// Headers of the selected table with role-hidden columns removed.
    pub fn visible_columns(&self) -> Vec<String> {
        self.current_table()
            .map(|t| self.access.visible_columns(self.role(), t.name.as_str(), &t.columns))
            .unwrap_or_default()
    }

    fn materializer(&self) -> Materializer<'_> {
        Materializer::new(&self.schema, &self.config)
    }

    fn selected_entity(&self) -> DashboardResult<EntityName> {
        self.view.entity().cloned().ok_or(DashboardError::NoTableSelected)
    }

    fn denied(&self, action: &str, entity: &str) -> DashboardError {
        AccessError::PermissionDenied {
            role: self.session.role.clone(),
            action: action.to_string(),
            entity: entity.to_string(),
        }
        .into()
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Load every entity the role may see. Failed entities come back empty
    /// and are added to the error list.
    pub async fn load(&mut self) {
        let entities = self.access.allowed_entities(self.role()).to_vec();
        let outcome = {
            let materializer = self.materializer();
            loader::load_tables(&self.services, &materializer, &entities).await
        };
        for failure in &outcome.failures {
            self.errors.error(failure.to_string());
        }
        self.tables = outcome.tables;
        self.server = None;
        info!(role = %self.session.role, tables = self.tables.len(), "dashboard loaded");
    }

    /// Re-fetch one entity and re-resolve every table.
    pub async fn reload_entity(&mut self, entity: &EntityName) {
        let result = {
            let materializer = Materializer::new(&self.schema, &self.config);
            loader::reload_entity(&self.services, &materializer, &mut self.tables, entity).await
        };
        if let Err(failure) = result {
            self.errors.error(failure.to_string());
        }
        self.server = None;
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    /// Select a table; filters, page and row selection start over.
    pub fn select_table(&mut self, entity: &str) -> DashboardResult<()> {
        if !self.access.grant(self.role(), entity).can_read() {
            return Err(self.denied("read", entity));
        }
        let name = self
            .tables
            .get(entity)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| EntityName::from(entity));
        self.view.select_table(name);
        self.server = None;
        Ok(())
    }

    pub fn deselect_table(&mut self) {
        self.view.deselect_table();
        self.server = None;
    }

    pub fn toggle_row(&mut self, visual_id: usize) {
        self.view.toggle_row(visual_id);
    }

    /// Jump to the row an FK cell of the selected table points at: the
    /// referenced table is selected, the row selected and its page shown.
    pub fn follow_reference(&mut self, visual_id: usize, column: &str) -> DashboardResult<()> {
        let entity = self.selected_entity()?;
        let table = self
            .tables
            .get(entity.as_str())
            .ok_or(DashboardError::NoTableSelected)?;
        let row = table
            .row_by_visual(visual_id)
            .ok_or_else(|| DashboardError::RowNotFound {
                entity: entity.to_string(),
                visual_id,
            })?;
        let Some(fk) = row.cell(column).and_then(|c| c.as_foreign()) else {
            return Err(gestek_core::FilterError::NotForeignKey {
                entity: entity.to_string(),
                column: column.to_string(),
            }
            .into());
        };
        let reference = fk.reference.clone();
        let target = fk.visual.ok_or_else(|| DashboardError::DanglingReference {
            entity: reference.to_string(),
            id: fk.raw_id().map(|id| id.to_string()).unwrap_or_default(),
        })?;

        self.select_table(reference.as_str())?;
        self.view.select_only(target);
        let len = self.tables.get(reference.as_str()).map(Table::len).unwrap_or(0);
        let position = self
            .tables
            .get(reference.as_str())
            .and_then(|t| t.rows.iter().position(|r| r.visual_id == target))
            .unwrap_or(0);
        self.view.set_page(position / self.view.page_size() + 1, len);
        debug!(from = %entity, to = %reference, visual_id = target, "followed reference");
        Ok(())
    }

    // ========================================================================
    // FILTERING AND PAGING
    // ========================================================================

    /// Set one client-side filter; a blank pattern removes it.
    pub fn set_filter(&mut self, key: &str, pattern: &str) {
        self.view.set_filter(key, pattern);
        self.server = None;
    }

    pub fn set_filters(&mut self, filters: FilterSet) {
        self.view.set_filters(filters);
        self.server = None;
    }

    pub fn clear_filters(&mut self) {
        self.view.clear_filters();
        self.server = None;
    }

    /// Rows of the selected table after filtering, before paging.
    pub fn filtered_rows(&self) -> DashboardResult<Vec<&Row>> {
        let engine = FilterEngine::new(&self.schema, &self.tables);
        let rows = match &self.server {
            Some(server) => engine.apply(&server.table, &server.local)?,
            None => {
                let table = self.current_table().ok_or(DashboardError::NoTableSelected)?;
                engine.apply(table, self.view.filters())?
            }
        };
        Ok(rows)
    }

    /// Current page of the selected table.
    pub fn page(&self) -> DashboardResult<GridPage<'_>> {
        let engine = FilterEngine::new(&self.schema, &self.tables);
        let page = match &self.server {
            Some(server) => {
                self.view
                    .render_with(&server.table, &server.local, &engine, &self.access, self.role())?
            }
            None => {
                let table = self.current_table().ok_or(DashboardError::NoTableSelected)?;
                self.view.render(table, &engine, &self.access, self.role())?
            }
        };
        Ok(page)
    }

    /// Move to `page`, clamped to the pages the filtered rows fill.
    pub fn set_page(&mut self, page: usize) -> DashboardResult<()> {
        let count = self.filtered_rows()?.len();
        self.view.set_page(page, count);
        Ok(())
    }

    pub fn total_pages(&self) -> DashboardResult<usize> {
        Ok(total_pages(self.filtered_rows()?.len(), self.view.page_size()))
    }

    /// Change the page size; only configured sizes are accepted.
    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        if !self.config.page_size_options.contains(&page_size) {
            return false;
        }
        self.view.set_page_size(page_size);
        true
    }

    /// Evaluate the view's filters on the backend.
    ///
    /// Plain text filters become `Contains` predicates, foreign filters are
    /// rewritten into id membership over the referenced collection, and the
    /// rest is applied locally afterwards. Returned rows keep their
    /// `visualId` from the loaded table. Returns the number of matches
    /// before local filtering.
    pub async fn apply_server_filters(&mut self) -> DashboardResult<usize> {
        let entity = self.selected_entity()?;
        let plan = {
            let engine = FilterEngine::new(&self.schema, &self.tables);
            let table = self.tables.get(entity.as_str()).ok_or(DashboardError::NoTableSelected)?;
            engine.plan_server(table, self.view.filters())?
        };

        let mut predicates = plan.predicates;
        let mut no_results = false;
        for lookup in &plan.foreign {
            let records = match fetch_all(&self.services, lookup.reference.as_str()).await {
                Ok(records) => records,
                Err(failure) => {
                    warn!(entity = %lookup.reference, error = %failure, "foreign lookup failed");
                    self.errors.error(failure.to_string());
                    Vec::new()
                }
            };
            let referenced = self.materializer().materialize(lookup.reference.as_str(), &records);
            let ids = matching_ids(&self.schema, &referenced, &lookup.sub_field, &lookup.pattern);
            match lookup.into_server_filter(&ids) {
                ServerFilter::Predicate(predicate) => predicates.push(predicate),
                ServerFilter::NoResults => no_results = true,
            }
        }

        let matched: BTreeSet<RawId> = if no_results {
            BTreeSet::new()
        } else {
            let service = self.services.require(entity.as_str())?;
            match service.filter(&predicates).await {
                Ok(records) => records.iter().filter_map(gestek_core::naming::record_id).collect(),
                Err(error) => {
                    warn!(entity = %entity, error = %error, "server filter failed");
                    self.errors.error(error.to_string());
                    return Err(error.into());
                }
            }
        };

        let table = self.tables.get(entity.as_str()).ok_or(DashboardError::NoTableSelected)?;
        let mut subset = Table::empty(table.name.clone(), table.columns.clone());
        subset.source = table.source;
        subset.rows = table
            .rows
            .iter()
            .filter(|row| row.id.as_ref().is_some_and(|id| matched.contains(id)))
            .cloned()
            .collect();
        debug!(
            entity = %entity,
            predicates = predicates.len(),
            matched = subset.rows.len(),
            local = plan.local.len(),
            "server filter applied"
        );
        let count = subset.rows.len();
        self.server = Some(ServerResult {
            table: subset,
            local: plan.local,
        });
        Ok(count)
    }

    /// Drop the server-side result and show the loaded table again.
    pub fn clear_server_filters(&mut self) {
        self.server = None;
    }

    pub fn has_server_result(&self) -> bool {
        self.server.is_some()
    }

    // ========================================================================
    // FORMS AND CRUD
    // ========================================================================

    /// Form values for a new record, or for editing the row `visual_id`.
    pub fn form_values(&self, visual_id: Option<usize>) -> DashboardResult<FormValues> {
        let entity = self.selected_entity()?;
        let def = self
            .schema
            .get_metadata(entity.as_str())
            .map_err(gestek_core::GestekError::from)?;
        let row = match visual_id {
            Some(visual_id) => Some(self.row(&entity, visual_id)?),
            None => None,
        };
        Ok(form::initial_values(def, row))
    }

    /// Dropdown options for FK field `field` of the selected table, from the
    /// role-unscoped collection.
    pub async fn fk_options(&self, field: &str) -> DashboardResult<Vec<FkOption>> {
        let entity = self.selected_entity()?;
        let reference = self.schema.reference_for(entity.as_str(), field).ok_or_else(|| {
            gestek_core::FilterError::NotForeignKey {
                entity: entity.to_string(),
                column: field.to_string(),
            }
        })?;
        let service = self.services.require(reference.as_str())?;
        let records = service.get_all().await?;
        let table = self.materializer().materialize(reference.as_str(), &records);
        Ok(form::fk_options(&table))
    }

    /// Create a record in the selected table.
    pub async fn create(&mut self, values: &FormValues) -> DashboardResult<Record> {
        let entity = self.selected_entity()?;
        if !self.access.can_create(self.role(), entity.as_str()) {
            return Err(self.denied("create", entity.as_str()));
        }
        form::validate_form(&self.schema, &self.access, self.role(), entity.as_str(), values)?;
        let payload = form::prepare_payload(
            &self.schema,
            &self.access,
            &self.session,
            entity.as_str(),
            values,
            None,
        );
        let service = self.services.require(entity.as_str())?;
        let created = match service.create(payload).await {
            Ok(record) => record,
            Err(error) => return Err(self.operation_failed(error, "create")),
        };
        info!(entity = %entity, "record created");
        self.reload_entity(&entity).await;
        Ok(created)
    }

    /// Update the row `visual_id` of the selected table.
    pub async fn update(
        &mut self,
        visual_id: usize,
        values: &FormValues,
    ) -> DashboardResult<Record> {
        let entity = self.selected_entity()?;
        if !self.access.can_edit(self.role(), entity.as_str()) {
            return Err(self.denied("edit", entity.as_str()));
        }
        let id = self.row_id(&entity, visual_id)?;
        form::validate_form(&self.schema, &self.access, self.role(), entity.as_str(), values)?;
        let payload = form::prepare_payload(
            &self.schema,
            &self.access,
            &self.session,
            entity.as_str(),
            values,
            Some(&id),
        );
        let service = self.services.require(entity.as_str())?;
        let updated = match service.update(&id, payload).await {
            Ok(record) => record,
            Err(error) => return Err(self.operation_failed(error, "update")),
        };
        info!(entity = %entity, id = %id, "record updated");
        self.reload_entity(&entity).await;
        Ok(updated)
    }

    /// Delete the row `visual_id` of the selected table.
    pub async fn delete(&mut self, visual_id: usize) -> DashboardResult<()> {
        let entity = self.selected_entity()?;
        if !self.access.can_delete(self.role(), entity.as_str()) {
            return Err(self.denied("delete", entity.as_str()));
        }
        let id = self.row_id(&entity, visual_id)?;
        let service = self.services.require(entity.as_str())?;
        if let Err(error) = service.delete(&id).await {
            return Err(self.operation_failed(error, "delete"));
        }
        info!(entity = %entity, id = %id, "record deleted");
        self.reload_entity(&entity).await;
        Ok(())
    }

    fn row(&self, entity: &EntityName, visual_id: usize) -> DashboardResult<&Row> {
        self.tables
            .get(entity.as_str())
            .and_then(|t| t.row_by_visual(visual_id))
            .ok_or_else(|| DashboardError::RowNotFound {
                entity: entity.to_string(),
                visual_id,
            })
    }

    fn row_id(&self, entity: &EntityName, visual_id: usize) -> DashboardResult<RawId> {
        self.row(entity, visual_id)?
            .id
            .clone()
            .ok_or_else(|| DashboardError::RowNotFound {
                entity: entity.to_string(),
                visual_id,
            })
    }

    fn operation_failed(
        &mut self,
        error: gestek_storage::StorageError,
        action: &str,
    ) -> DashboardError {
        let failure = error.into_operation_error(action);
        warn!(entity = %failure.entity, action, reason = %failure.reason, "operation failed");
        self.errors.error(failure.to_string());
        failure.into()
    }
}
