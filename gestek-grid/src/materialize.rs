//! Table Materializer
//!
//! Turns one entity's raw records into a [`Table`]. Foreign-key cells are
//! tagged here but left unresolved; resolution needs the complete table set
//! and happens in [`crate::resolve`].

use gestek_core::naming::{self, lookup_field, record_id, VISUAL_ID};
use gestek_core::{
    Cell, ColumnSource, ColumnStrategy, EntityName, FieldKind, FkCell, GridConfig, RawId,
    Record, Row, SchemaRegistry, Table, VisualIdOrder,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Materializes records against a schema registry and grid settings.
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    schema: &'a SchemaRegistry,
    config: &'a GridConfig,
}

impl<'a> Materializer<'a> {
    pub fn new(schema: &'a SchemaRegistry, config: &'a GridConfig) -> Self {
        Self { schema, config }
    }

    /// Build the table for `entity` from `records`.
    ///
    /// `visualId` is assigned 1..N; with [`VisualIdOrder::BackendOrder`] that
    /// is the order of `records`.
    pub fn materialize(&self, entity: &str, records: &[Record]) -> Table {
        let name = EntityName::from(entity);
        let (columns, source) = self.columns(entity, records);

        let mut ordered: Vec<&Record> = records.iter().collect();
        if self.config.visual_id_order == VisualIdOrder::PrimaryKey {
            ordered.sort_by(|a, b| compare_ids(record_id(a).as_ref(), record_id(b).as_ref()));
        }

        let rows: Vec<Row> = ordered
            .into_iter()
            .enumerate()
            .map(|(index, record)| self.row(entity, &columns, index + 1, record))
            .collect();

        debug!(
            entity = %name,
            rows = rows.len(),
            columns = columns.len(),
            source = ?source,
            "materialized table"
        );

        Table {
            name,
            columns,
            rows,
            source,
        }
    }

    fn columns(&self, entity: &str, records: &[Record]) -> (Vec<String>, ColumnSource) {
        let schema_columns = self
            .schema
            .get_metadata(entity)
            .ok()
            .map(|def| def.default_columns());

        let Some(first) = records.first() else {
            let columns = schema_columns.unwrap_or_else(|| vec![VISUAL_ID.to_string()]);
            return (columns, ColumnSource::Default);
        };

        match (self.config.column_strategy, schema_columns) {
            (ColumnStrategy::SchemaFirst, Some(columns)) => (columns, ColumnSource::Schema),
            _ => {
                let columns = std::iter::once(VISUAL_ID.to_string())
                    .chain(
                        first
                            .keys()
                            .filter(|k| !naming::is_primary_key(k) && k.as_str() != VISUAL_ID)
                            .cloned(),
                    )
                    .collect();
                (columns, ColumnSource::Inferred)
            }
        }
    }

    fn row(&self, entity: &str, columns: &[String], visual_id: usize, record: &Record) -> Row {
        let mut cells = BTreeMap::new();
        for column in columns.iter().filter(|c| c.as_str() != VISUAL_ID) {
            let value = lookup_field(record, column)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null);
            cells.insert(column.clone(), self.cell(entity, column, value));
        }
        let id = record_id(record);
        trace!(entity, visual_id, id = ?id, "materialized row");
        Row {
            visual_id,
            id,
            cells,
        }
    }

    fn cell(&self, entity: &str, column: &str, value: Value) -> Cell {
        if let Some(reference) = self.schema.reference_for(entity, column) {
            if self.schema.contains(reference.as_str()) {
                return Cell::Foreign(FkCell::new(reference, value));
            }
        }
        match self.schema.field_kind(entity, column) {
            FieldKind::Enum(spec) => {
                let label = value
                    .as_i64()
                    .and_then(|code| spec.label_of(code))
                    .map(|label| Value::String(label.to_string()));
                Cell::Scalar(label.unwrap_or(value))
            }
            _ => Cell::Scalar(value),
        }
    }
}

/// Numeric ids sort first and numerically, the rest lexically; rows without
/// an id sort last.
fn compare_ids(a: Option<&RawId>, b: Option<&RawId>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => id_key(a).cmp(&id_key(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total-order key: `(non-numeric, number, text)`.
fn id_key(id: &RawId) -> (bool, i64, &str) {
    match id.as_str().parse::<i64>() {
        Ok(n) => (false, n, id.as_str()),
        Err(_) => (true, 0, id.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestek_core::SCHEMA;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_equipments_get_dense_visual_ids_and_fk_cells() {
        let config = GridConfig::default();
        let table = Materializer::new(&SCHEMA, &config).materialize(
            "Equipments",
            &records(json!([
                {"Id": "e1", "Name": "MRI", "DepartmentId": "d1"},
                {"Id": "e2", "Name": "X-Ray", "DepartmentId": "d2"}
            ])),
        );

        assert_eq!(table.rows.iter().map(|r| r.visual_id).collect::<Vec<_>>(), vec![1, 2]);
        let fk = table.rows[0].cell("DepartmentId").unwrap().as_foreign().unwrap();
        assert_eq!(fk.reference, EntityName::from("Departments"));
        assert_eq!(fk.value, json!("d1"));
        assert_eq!(fk.visual, None);
        assert_eq!(table.source, ColumnSource::Schema);
        assert!(!table.has_column("Id"));
        assert_eq!(table.columns[0], VISUAL_ID);
    }

    #[test]
    fn test_empty_input_uses_default_columns() {
        let config = GridConfig::default();
        let table = Materializer::new(&SCHEMA, &config).materialize("Departments", &[]);
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["visualId", "Name", "SectionId"]);
        assert_eq!(table.source, ColumnSource::Default);
    }

    #[test]
    fn test_unknown_entity_infers_columns_from_first_record() {
        let config = GridConfig::default();
        let table = Materializer::new(&SCHEMA, &config).materialize(
            "Widgets",
            &records(json!([
                {"Id": 1, "Label": "a", "DepartmentId": "d1", "GadgetId": "g1"}
            ])),
        );
        assert_eq!(table.source, ColumnSource::Inferred);
        assert_eq!(table.columns, vec!["visualId", "Label", "DepartmentId", "GadgetId"]);
        assert!(table.rows[0].cell("DepartmentId").unwrap().is_foreign());
        // Convention target not registered: stays a scalar.
        assert!(!table.rows[0].cell("GadgetId").unwrap().is_foreign());
        assert_eq!(table.rows[0].id, Some(RawId::new("1")));
    }

    #[test]
    fn test_first_record_strategy_ignores_schema() {
        let config = GridConfig {
            column_strategy: ColumnStrategy::FirstRecord,
            ..GridConfig::default()
        };
        let table = Materializer::new(&SCHEMA, &config)
            .materialize("Sections", &records(json!([{"id": "s1", "name": "North"}])));
        assert_eq!(table.columns, vec!["visualId", "name"]);
        assert_eq!(table.source, ColumnSource::Inferred);
    }

    #[test]
    fn test_camel_case_keys_fill_schema_columns() {
        let config = GridConfig::default();
        let table = Materializer::new(&SCHEMA, &config)
            .materialize("Sections", &records(json!([{"id": "s1", "name": "North"}])));
        assert_eq!(table.rows[0].text("Name"), "North");
        assert_eq!(table.rows[0].id, Some(RawId::new("s1")));
    }

    #[test]
    fn test_enum_codes_render_as_labels() {
        let config = GridConfig::default();
        let table = Materializer::new(&SCHEMA, &config).materialize(
            "Equipments",
            &records(json!([
                {"Id": "e1", "Name": "MRI", "StateId": 1, "LocationTypeId": "Warehouse"}
            ])),
        );
        assert_eq!(table.rows[0].text("StateId"), "UnderMaintenance");
        assert_eq!(table.rows[0].text("LocationTypeId"), "Warehouse");
    }

    #[test]
    fn test_primary_key_order_is_stable() {
        let config = GridConfig {
            visual_id_order: VisualIdOrder::PrimaryKey,
            ..GridConfig::default()
        };
        let m = Materializer::new(&SCHEMA, &config);
        let a = m.materialize(
            "Sections",
            &records(json!([{"Id": 10, "Name": "B"}, {"Id": 9, "Name": "A"}])),
        );
        let b = m.materialize(
            "Sections",
            &records(json!([{"Id": 9, "Name": "A"}, {"Id": 10, "Name": "B"}])),
        );
        assert_eq!(a, b);
        assert_eq!(a.row_by_id("9").map(|r| r.visual_id), Some(1));
    }

    #[test]
    fn test_primary_key_order_with_mixed_ids() {
        let config = GridConfig {
            visual_id_order: VisualIdOrder::PrimaryKey,
            ..GridConfig::default()
        };
        let m = Materializer::new(&SCHEMA, &config);
        let order = |ids: &[&str]| -> Vec<String> {
            let input: Vec<Value> = ids
                .iter()
                .map(|id| json!({"Id": id, "Name": id}))
                .collect();
            m.materialize("Sections", &records(Value::Array(input)))
                .rows
                .iter()
                .filter_map(|r| r.id.as_ref().map(|id| id.to_string()))
                .collect()
        };

        let expected = vec!["9", "10", "1a"];
        for permutation in [
            ["10", "9", "1a"],
            ["1a", "10", "9"],
            ["9", "1a", "10"],
            ["1a", "9", "10"],
        ] {
            assert_eq!(order(&permutation), expected);
        }
    }

    #[test]
    fn test_id_ordering_is_total() {
        let ids: Vec<RawId> = ["10", "9", "1a", "-3", "b", "007", "7"]
            .into_iter()
            .map(RawId::new)
            .collect();
        for a in &ids {
            for b in &ids {
                assert_eq!(
                    compare_ids(Some(a), Some(b)),
                    compare_ids(Some(b), Some(a)).reverse()
                );
                for c in &ids {
                    let ab = compare_ids(Some(a), Some(b));
                    let bc = compare_ids(Some(b), Some(c));
                    if ab != Ordering::Greater && bc != Ordering::Greater {
                        assert_ne!(compare_ids(Some(a), Some(c)), Ordering::Greater);
                    }
                }
            }
        }
    }
}
