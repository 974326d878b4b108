//! FK Resolver
//!
//! A second pass over a complete [`TableSet`]: every FK cell gets the
//! `visualId` of the row it points at. Lookups go through an explicit
//! [`ResolutionContext`] built from the set, so resolving is a pure function
//! of the rows and running it twice changes nothing.

use gestek_core::{EntityName, RawId, TableSet};
use std::collections::HashMap;
use tracing::debug;

/// Entity → raw id → `visualId` index over a table set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    index: HashMap<EntityName, HashMap<RawId, usize>>,
}

impl ResolutionContext {
    pub fn build(tables: &TableSet) -> Self {
        let index = tables
            .iter()
            .map(|table| {
                let ids = table
                    .rows
                    .iter()
                    .filter_map(|row| row.id.clone().map(|id| (id, row.visual_id)))
                    .collect();
                (table.name.clone(), ids)
            })
            .collect();
        Self { index }
    }

    /// `visualId` of the row of `entity` whose raw id is `id`.
    pub fn visual_id(&self, entity: &str, id: &str) -> Option<usize> {
        self.index.get(entity)?.get(id).copied()
    }

    pub fn has_entity(&self, entity: &str) -> bool {
        self.index.contains_key(entity)
    }
}

/// Counts from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub resolved: usize,
    pub dangling: usize,
}

/// Resolve every FK cell of `tables` against the set itself.
pub fn resolve_visual_ids(mut tables: TableSet) -> TableSet {
    let context = ResolutionContext::build(&tables);
    resolve_with(&mut tables, &context);
    tables
}

/// Recompute FK `visual` values from `context`. Dangling references are set
/// to `None`, never an error.
pub fn resolve_with(tables: &mut TableSet, context: &ResolutionContext) -> ResolutionSummary {
    let mut summary = ResolutionSummary::default();
    for table in tables.iter_mut() {
        let mut dangling = 0usize;
        for row in &mut table.rows {
            for cell in row.cells.values_mut() {
                let gestek_core::Cell::Foreign(fk) = cell else {
                    continue;
                };
                fk.visual = fk
                    .raw_id()
                    .and_then(|id| context.visual_id(fk.reference.as_str(), id.as_str()));
                match fk.visual {
                    Some(_) => summary.resolved += 1,
                    None => dangling += 1,
                }
            }
        }
        if dangling > 0 {
            debug!(entity = %table.name, dangling, "unresolved foreign references");
        }
        summary.dangling += dangling;
    }
    debug!(
        tables = tables.len(),
        resolved = summary.resolved,
        dangling = summary.dangling,
        "resolved foreign keys"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestek_core::{Cell, FkCell, Row, Table};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn table(name: &str, rows: Vec<(&str, Option<(&str, &str, &str)>)>) -> Table {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, (id, fk))| {
                let mut cells = BTreeMap::new();
                if let Some((column, reference, value)) = fk {
                    cells.insert(
                        column.to_string(),
                        Cell::Foreign(FkCell::new(EntityName::from(reference), json!(value))),
                    );
                }
                Row {
                    visual_id: i + 1,
                    id: Some(RawId::new(id)),
                    cells,
                }
            })
            .collect();
        Table {
            name: EntityName::from(name),
            columns: vec![],
            rows,
            source: gestek_core::ColumnSource::Schema,
        }
    }

    fn fixture() -> TableSet {
        [
            table("Departments", vec![("d1", None), ("d2", None)]),
            table(
                "Equipments",
                vec![
                    ("e1", Some(("DepartmentId", "Departments", "d2"))),
                    ("e2", Some(("DepartmentId", "Departments", "missing"))),
                ],
            ),
        ]
        .into_iter()
        .collect()
    }

    fn visual(tables: &TableSet, entity: &str, row: usize) -> Option<usize> {
        tables.get(entity).unwrap().rows[row]
            .cell("DepartmentId")
            .and_then(Cell::as_foreign)
            .and_then(|fk| fk.visual)
    }

    #[test]
    fn test_resolves_to_referenced_visual_id() {
        let tables = resolve_visual_ids(fixture());
        assert_eq!(visual(&tables, "Equipments", 0), Some(2));
    }

    #[test]
    fn test_dangling_reference_stays_none() {
        let tables = resolve_visual_ids(fixture());
        assert_eq!(visual(&tables, "Equipments", 1), None);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let once = resolve_visual_ids(fixture());
        let twice = resolve_visual_ids(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_referenced_table_leaves_none() {
        let tables: TableSet = [table(
            "Equipments",
            vec![("e1", Some(("DepartmentId", "Departments", "d1")))],
        )]
        .into_iter()
        .collect();
        let mut tables = tables;
        let context = ResolutionContext::build(&tables);
        let summary = resolve_with(&mut tables, &context);
        assert_eq!(summary, ResolutionSummary { resolved: 0, dangling: 1 });
        assert!(!context.has_entity("Departments"));
    }
}
