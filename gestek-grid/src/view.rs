//! Grid view state: selected table, filters, page and row selection.
//!
//! Rendering applies the stages in a fixed order: role overlay (hidden
//! columns, allowed tables), filters, then pagination.

use crate::filter::{FilterEngine, FilterSet};
use crate::paginate::{clamp_page, paginate, total_pages};
use gestek_core::{AccessMatrix, EntityName, FilterError, Row, Table, TableSet};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridView {
    entity: Option<EntityName>,
    filters: FilterSet,
    page: usize,
    page_size: usize,
    /// Selected rows by `visualId`.
    selected: BTreeSet<usize>,
}

/// One rendered page of the selected table.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPage<'t> {
    pub entity: EntityName,
    /// Columns after removing the role's hidden set.
    pub columns: Vec<String>,
    pub rows: Vec<&'t Row>,
    pub page: usize,
    pub total_pages: usize,
    /// Row count after filtering, before slicing.
    pub total_rows: usize,
}

impl GridView {
    pub fn new(page_size: usize) -> Self {
        Self {
            entity: None,
            filters: FilterSet::new(),
            page: 1,
            page_size: page_size.max(1),
            selected: BTreeSet::new(),
        }
    }

    pub fn entity(&self) -> Option<&EntityName> {
        self.entity.as_ref()
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Switch tables. Filters, page and selection start over.
    pub fn select_table(&mut self, entity: EntityName) {
        self.entity = Some(entity);
        self.filters.clear();
        self.page = 1;
        self.selected.clear();
    }

    pub fn deselect_table(&mut self) {
        self.entity = None;
        self.filters.clear();
        self.page = 1;
        self.selected.clear();
    }

    /// Replace the filter set; pagination restarts at page 1.
    pub fn set_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
        self.page = 1;
    }

    pub fn set_filter(&mut self, key: &str, pattern: &str) {
        self.filters.set(key, pattern);
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.set_filters(FilterSet::new());
    }

    /// Move to `page`, clamped to the pages available for `row_count` rows.
    pub fn set_page(&mut self, page: usize, row_count: usize) {
        self.page = clamp_page(page, total_pages(row_count, self.page_size));
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn toggle_row(&mut self, visual_id: usize) {
        if !self.selected.remove(&visual_id) {
            self.selected.insert(visual_id);
        }
    }

    /// Make `visual_id` the only selected row.
    pub fn select_only(&mut self, visual_id: usize) {
        self.selected.clear();
        self.selected.insert(visual_id);
    }

    pub fn is_selected(&self, visual_id: usize) -> bool {
        self.selected.contains(&visual_id)
    }

    pub fn selected_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }

    /// Render the current page of `table` for `role`.
    pub fn render<'t>(
        &self,
        table: &'t Table,
        engine: &FilterEngine<'_>,
        access: &AccessMatrix,
        role: &str,
    ) -> Result<GridPage<'t>, FilterError> {
        self.render_with(table, &self.filters, engine, access, role)
    }

    /// Render `table` with an explicit filter set instead of the view's
    /// own, keeping the view's page and page size.
    pub fn render_with<'t>(
        &self,
        table: &'t Table,
        filters: &FilterSet,
        engine: &FilterEngine<'_>,
        access: &AccessMatrix,
        role: &str,
    ) -> Result<GridPage<'t>, FilterError> {
        let columns = access.visible_columns(role, table.name.as_str(), &table.columns);
        let rows = engine.apply(table, filters)?;
        let page = paginate(&rows, self.page, self.page_size);
        Ok(GridPage {
            entity: table.name.clone(),
            columns,
            rows: page.rows,
            page: page.page,
            total_pages: page.total_pages,
            total_rows: page.total_rows,
        })
    }
}

impl Default for GridView {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Tables of `tables` the role may see, in the role's configured order.
pub fn visible_tables<'t>(
    tables: &'t TableSet,
    access: &AccessMatrix,
    role: &str,
) -> Vec<&'t Table> {
    access
        .allowed_entities(role)
        .iter()
        .filter_map(|entity| tables.get(entity.as_str()))
        .collect()
}
