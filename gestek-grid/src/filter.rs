//! Filter Engine
//!
//! A filter set maps a column key to a text pattern. Keys are either a plain
//! column (`Name`) or a foreign path (`DepartmentId.Name`). A foreign filter
//! is rewritten into a raw-id membership test over the FK column by scanning
//! the referenced table; an empty match set filters out every row.
//!
//! Numeric and date columns accept `>`, `<`, `>=` and `<=` prefixes. Without
//! a prefix numbers match exactly and everything else matches as a
//! case-insensitive substring. All filters are AND-combined.

use crate::scalar::{contains_ci, parse_date, parse_number, parse_number_str};
use gestek_core::naming::VISUAL_ID;
use gestek_core::table::value_text;
use gestek_core::{
    Cell, EntityName, FieldKind, FilterError, Predicate, PredicateString, RawId, Row,
    SchemaRegistry, Table, TableSet,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

static COMPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(>=|<=|>|<)\s*(.*?)\s*$").expect("Invalid comparator regex")
});

// ============================================================================
// FILTER SET
// ============================================================================

/// Active filters: column key → pattern. Blank patterns are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet(BTreeMap<String, String>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.set(key, pattern);
        self
    }

    /// Set a filter; a blank pattern removes the key.
    pub fn set(&mut self, key: impl Into<String>, pattern: impl Into<String>) {
        let key = key.into();
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, pattern);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = FilterSet::new();
        for (key, pattern) in iter {
            set.set(key, pattern);
        }
        set
    }
}

// ============================================================================
// KEYS AND PATTERNS
// ============================================================================

/// A parsed filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey<'a> {
    Plain(&'a str),
    /// `column.sub_field`: match `sub_field` in the table `column` refers to.
    Foreign { column: &'a str, sub_field: &'a str },
}

impl<'a> FilterKey<'a> {
    pub fn parse(key: &'a str) -> Result<Self, FilterError> {
        let malformed = || FilterError::MalformedKey {
            key: key.to_string(),
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(malformed());
        }
        match key.split_once('.') {
            None => Ok(FilterKey::Plain(key)),
            Some((column, sub_field))
                if !column.is_empty() && !sub_field.is_empty() && !sub_field.contains('.') =>
            {
                Ok(FilterKey::Foreign { column, sub_field })
            }
            Some(_) => Err(malformed()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Comparator::Gt),
            "<" => Some(Comparator::Lt),
            ">=" => Some(Comparator::Ge),
            "<=" => Some(Comparator::Le),
            _ => None,
        }
    }

    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Ge => ordering != Ordering::Less,
            Comparator::Le => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Compare(Comparator, String),
    Text(String),
}

impl Pattern {
    /// Comparator prefixes are only recognized on comparable columns;
    /// elsewhere `>` is ordinary text.
    pub fn parse(pattern: &str, comparable: bool) -> Self {
        if comparable {
            if let Some(caps) = COMPARATOR.captures(pattern) {
                let comparator = caps
                    .get(1)
                    .and_then(|m| Comparator::from_symbol(m.as_str()));
                let operand = caps.get(2).map(|m| m.as_str().to_string());
                if let (Some(comparator), Some(operand)) = (comparator, operand) {
                    return Pattern::Compare(comparator, operand);
                }
            }
        }
        Pattern::Text(pattern.trim().to_string())
    }
}

/// True when `pattern` starts with a comparator prefix.
pub fn has_comparator(pattern: &str) -> bool {
    matches!(Pattern::parse(pattern, true), Pattern::Compare(..))
}

// ============================================================================
// MATCHING
// ============================================================================

fn match_scalar(kind: FieldKind, value: &Value, pattern: &Pattern) -> bool {
    match (pattern, kind) {
        (Pattern::Compare(op, operand), FieldKind::Number) => {
            match (parse_number(value), parse_number_str(operand)) {
                (Some(a), Some(b)) => a.partial_cmp(&b).is_some_and(|o| op.holds(o)),
                _ => false,
            }
        }
        (Pattern::Compare(op, operand), FieldKind::Date) => {
            match (parse_date(&value_text(value)), parse_date(operand)) {
                (Some(a), Some(b)) => op.holds(a.cmp(&b)),
                _ => false,
            }
        }
        (Pattern::Compare(..), _) => false,
        (Pattern::Text(text), FieldKind::Number) => {
            match (parse_number(value), parse_number_str(text)) {
                (Some(a), Some(b)) => a == b,
                _ => contains_ci(&value_text(value), text),
            }
        }
        (Pattern::Text(text), _) => contains_ci(&value_text(value), text),
    }
}

fn match_row(row: &Row, column: &str, kind: FieldKind, pattern: &Pattern) -> bool {
    if column == VISUAL_ID {
        return match_scalar(FieldKind::Number, &Value::from(row.visual_id), pattern);
    }
    match row.cell(column) {
        Some(Cell::Foreign(fk)) => {
            let text = match pattern {
                Pattern::Text(text) => text.as_str(),
                Pattern::Compare(..) => return false,
            };
            let raw = fk.raw_id().map(|id| id.to_string()).unwrap_or_default();
            let visual = fk.visual.map(|v| v.to_string()).unwrap_or_default();
            contains_ci(&raw, text) || (!visual.is_empty() && contains_ci(&visual, text))
        }
        Some(Cell::Scalar(value)) => match_scalar(kind, value, pattern),
        None => match_scalar(kind, &Value::Null, pattern),
    }
}

/// Column name as stored in `table`, matching `key` case-insensitively.
fn table_column(table: &Table, key: &str) -> String {
    table
        .columns
        .iter()
        .find(|c| c.as_str() == key)
        .or_else(|| table.columns.iter().find(|c| c.eq_ignore_ascii_case(key)))
        .cloned()
        .unwrap_or_else(|| key.to_string())
}

fn column_kind(schema: &SchemaRegistry, entity: &str, column: &str) -> FieldKind {
    if column == VISUAL_ID {
        FieldKind::Number
    } else {
        schema.field_kind(entity, column)
    }
}

// ============================================================================
// COMPILED FILTERS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CompiledFilter {
    Column {
        column: String,
        kind: FieldKind,
        pattern: Pattern,
    },
    /// Keep rows whose raw FK value is in `ids`.
    ForeignIds {
        column: String,
        reference: EntityName,
        ids: BTreeSet<RawId>,
    },
}

impl CompiledFilter {
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            CompiledFilter::Column {
                column,
                kind,
                pattern,
            } => match_row(row, column, *kind, pattern),
            CompiledFilter::ForeignIds { column, ids, .. } => row
                .cell(column)
                .and_then(|cell| RawId::from_value(cell.value()))
                .is_some_and(|id| ids.contains(&id)),
        }
    }
}

/// Filter engine over one loaded table set.
#[derive(Debug, Clone, Copy)]
pub struct FilterEngine<'a> {
    schema: &'a SchemaRegistry,
    tables: &'a TableSet,
}

impl<'a> FilterEngine<'a> {
    pub fn new(schema: &'a SchemaRegistry, tables: &'a TableSet) -> Self {
        Self { schema, tables }
    }

    pub fn compile(
        &self,
        table: &Table,
        filters: &FilterSet,
    ) -> Result<Vec<CompiledFilter>, FilterError> {
        let entity = table.name.as_str();
        let mut compiled = Vec::with_capacity(filters.len());
        for (key, pattern) in filters.iter() {
            match FilterKey::parse(key)? {
                FilterKey::Plain(column) => {
                    let column = table_column(table, column);
                    let kind = column_kind(self.schema, entity, &column);
                    compiled.push(CompiledFilter::Column {
                        pattern: Pattern::parse(pattern, kind.is_comparable()),
                        column,
                        kind,
                    });
                }
                FilterKey::Foreign { column, sub_field } => {
                    let column = table_column(table, column);
                    let reference = self.schema.reference_for(entity, &column).ok_or_else(|| {
                        FilterError::NotForeignKey {
                            entity: entity.to_string(),
                            column: column.clone(),
                        }
                    })?;
                    let ids = self
                        .tables
                        .get(reference.as_str())
                        .map(|target| matching_ids(self.schema, target, sub_field, pattern))
                        .unwrap_or_default();
                    debug!(
                        entity,
                        column = %column,
                        reference = %reference,
                        matched = ids.len(),
                        "resolved foreign filter"
                    );
                    compiled.push(CompiledFilter::ForeignIds {
                        column,
                        reference,
                        ids,
                    });
                }
            }
        }
        Ok(compiled)
    }

    /// Rows of `table` passing every filter, in table order.
    pub fn apply<'t>(
        &self,
        table: &'t Table,
        filters: &FilterSet,
    ) -> Result<Vec<&'t Row>, FilterError> {
        let compiled = self.compile(table, filters)?;
        Ok(table
            .rows
            .iter()
            .filter(|row| compiled.iter().all(|f| f.matches(row)))
            .collect())
    }

    /// Split a filter set into what the backend can evaluate and what must
    /// run locally.
    ///
    /// String columns go to the backend as `Contains`; foreign keys become
    /// lookups the caller resolves against the referenced collection;
    /// everything else (comparators, numbers, dates, enums, FK labels,
    /// `visualId`) stays local.
    pub fn plan_server(
        &self,
        table: &Table,
        filters: &FilterSet,
    ) -> Result<ServerPlan, FilterError> {
        let entity = table.name.as_str();
        let mut plan = ServerPlan::default();
        for (key, pattern) in filters.iter() {
            match FilterKey::parse(key)? {
                FilterKey::Plain(column) => {
                    let column = table_column(table, column);
                    let is_string = column != VISUAL_ID
                        && !self.schema.is_foreign_key_field(entity, &column)
                        && self.schema.field_kind(entity, &column) == FieldKind::String;
                    match build_server_predicate(&column, pattern).filter(|_| is_string) {
                        Some(predicate) => plan.predicates.push(predicate),
                        None => plan.local.set(key, pattern),
                    }
                }
                FilterKey::Foreign { column, sub_field } => {
                    let column = table_column(table, column);
                    let reference = self.schema.reference_for(entity, &column).ok_or_else(|| {
                        FilterError::NotForeignKey {
                            entity: entity.to_string(),
                            column: column.clone(),
                        }
                    })?;
                    plan.foreign.push(ForeignLookup {
                        column,
                        reference,
                        sub_field: sub_field.to_string(),
                        pattern: pattern.to_string(),
                    });
                }
            }
        }
        Ok(plan)
    }
}

/// Raw ids of the rows of `table` whose `sub_field` matches `pattern`.
pub fn matching_ids(
    schema: &SchemaRegistry,
    table: &Table,
    sub_field: &str,
    pattern: &str,
) -> BTreeSet<RawId> {
    let column = table_column(table, sub_field);
    let kind = column_kind(schema, table.name.as_str(), &column);
    let pattern = Pattern::parse(pattern, kind.is_comparable());
    table
        .rows
        .iter()
        .filter(|row| match_row(row, &column, kind, &pattern))
        .filter_map(|row| row.id.clone())
        .collect()
}

// ============================================================================
// SERVER-DELEGATED FILTERING
// ============================================================================

/// Backend `Contains` predicate for a plain column key.
///
/// `None` for blank patterns, foreign paths and comparator patterns, which
/// are not expressible as a single backend predicate.
pub fn build_server_predicate(column_key: &str, pattern: &str) -> Option<PredicateString> {
    let pattern = pattern.trim();
    if pattern.is_empty() || column_key.contains('.') || has_comparator(pattern) {
        return None;
    }
    Some(Predicate::contains(column_key, pattern).to_predicate_string())
}

/// Result of rewriting a foreign filter for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFilter {
    Predicate(PredicateString),
    /// No referenced row matched; the filter admits nothing.
    NoResults,
}

/// A foreign filter waiting for the referenced collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignLookup {
    pub column: String,
    pub reference: EntityName,
    pub sub_field: String,
    pub pattern: String,
}

impl ForeignLookup {
    /// Rewrite into equality/membership over the raw FK column.
    pub fn into_server_filter(&self, ids: &BTreeSet<RawId>) -> ServerFilter {
        match Predicate::membership(&self.column, ids) {
            Some(predicate) => ServerFilter::Predicate(predicate.to_predicate_string()),
            None => ServerFilter::NoResults,
        }
    }
}

/// Backend predicates, pending foreign lookups and local leftovers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPlan {
    pub predicates: Vec<PredicateString>,
    pub foreign: Vec<ForeignLookup>,
    pub local: FilterSet,
}
