//! Materialized table model
//!
//! A [`Table`] is the self-describing form of one entity collection: ordered
//! column keys with the synthetic `visualId` first, and rows whose cells are
//! either plain JSON scalars or foreign-key cells awaiting resolution.

use crate::naming::VISUAL_ID;
use crate::{EntityName, RawId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How a table's column list was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSource {
    /// Registered schema fields.
    Schema,
    /// Keys of the first record; the entity had no usable schema or the
    /// first-record strategy was requested.
    Inferred,
    /// Static default columns of an empty collection.
    Default,
}

/// A cell holding a raw reference to a row of another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FkCell {
    /// Referenced entity.
    pub reference: EntityName,
    /// Raw foreign id as received.
    pub value: Value,
    /// `visualId` of the referenced row; `None` until resolved or when the
    /// reference dangles.
    pub visual: Option<usize>,
}

impl FkCell {
    pub fn new(reference: EntityName, value: Value) -> Self {
        Self {
            reference,
            value,
            visual: None,
        }
    }

    pub fn raw_id(&self) -> Option<RawId> {
        RawId::from_value(&self.value)
    }

    /// Resolved label, else the raw id, else empty.
    pub fn display(&self) -> String {
        match (self.visual, self.raw_id()) {
            (Some(visual), _) => visual.to_string(),
            (None, Some(id)) => id.to_string(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Scalar(Value),
    Foreign(FkCell),
}

impl Cell {
    pub fn as_foreign(&self) -> Option<&FkCell> {
        match self {
            Cell::Foreign(fk) => Some(fk),
            Cell::Scalar(_) => None,
        }
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, Cell::Foreign(_))
    }

    /// The underlying JSON value (raw id for FK cells).
    pub fn value(&self) -> &Value {
        match self {
            Cell::Scalar(value) => value,
            Cell::Foreign(fk) => &fk.value,
        }
    }

    /// String representation used for matching and display.
    pub fn text(&self) -> String {
        match self {
            Cell::Scalar(value) => value_text(value),
            Cell::Foreign(fk) => fk.display(),
        }
    }
}

/// Plain-text rendering of a JSON scalar; null renders empty.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// 1-based display label, dense within the table.
    pub visual_id: usize,
    /// Raw primary key, kept out of the column list.
    pub id: Option<RawId>,
    pub cells: BTreeMap<String, Cell>,
}

impl Row {
    pub fn cell(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn cell_mut(&mut self, column: &str) -> Option<&mut Cell> {
        self.cells.get_mut(column)
    }

    /// Text of a column, with `visualId` answered from the row itself.
    pub fn text(&self, column: &str) -> String {
        if column == VISUAL_ID {
            return self.visual_id.to_string();
        }
        self.cell(column).map(Cell::text).unwrap_or_default()
    }

    pub fn foreign_cells(&self) -> impl Iterator<Item = (&String, &FkCell)> {
        self.cells
            .iter()
            .filter_map(|(column, cell)| cell.as_foreign().map(|fk| (column, fk)))
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_ref().is_some_and(|own| own.as_str() == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: EntityName,
    /// Column keys, `visualId` first, primary key excluded.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub source: ColumnSource,
}

impl Table {
    /// A table with no rows.
    pub fn empty(name: EntityName, columns: Vec<String>) -> Self {
        Self {
            name,
            columns,
            rows: Vec::new(),
            source: ColumnSource::Default,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_by_id(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|row| row.has_id(id))
    }

    pub fn row_by_visual(&self, visual_id: usize) -> Option<&Row> {
        self.rows.iter().find(|row| row.visual_id == visual_id)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Columns other than the synthetic `visualId`.
    pub fn data_columns(&self) -> impl Iterator<Item = &String> {
        self.columns.iter().filter(|c| c.as_str() != VISUAL_ID)
    }
}

/// The full set of tables loaded for one dashboard, in load order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSet {
    tables: Vec<Table>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, replacing any table with the same name in place.
    pub fn insert(&mut self, table: Table) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(slot) => *slot = table,
            None => self.tables.push(table),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &EntityName> {
        self.tables.iter().map(|t| &t.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<Table> for TableSet {
    fn from_iter<I: IntoIterator<Item = Table>>(iter: I) -> Self {
        let mut set = TableSet::new();
        for table in iter {
            set.insert(table);
        }
        set
    }
}

impl IntoIterator for TableSet {
    type Item = Table;
    type IntoIter = std::vec::IntoIter<Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}
