//! Field naming conventions
//!
//! A field named `<Base>Id` (PascalCase, case-sensitive) refers to the entity
//! `<Base>s`. A handful of role-named fields break the pattern and are listed
//! in [`REFERENCE_ALIASES`]. Explicit schema metadata always wins over these
//! guesses; see [`crate::SchemaRegistry::reference_for`].

use crate::{EntityName, Record};

/// Name of the primary-key field in backend records.
pub const PRIMARY_KEY: &str = "Id";

/// Synthetic first column holding the 1-based row label.
pub const VISUAL_ID: &str = "visualId";

/// Fields whose referenced entity is not `<Base>s`.
pub const REFERENCE_ALIASES: &[(&str, &str)] = &[
    ("SourceDepartmentId", "Departments"),
    ("TargetDepartmentId", "Departments"),
    ("RequesterId", "Responsibles"),
    ("ResolverId", "Responsibles"),
    ("RecipientId", "Employees"),
];

/// Guess the entity a field refers to from its name alone.
///
/// Returns `None` for names that do not follow the `<Base>Id` pattern. The
/// guess is not checked against any registry.
pub fn referenced_entity_by_convention(field: &str) -> Option<EntityName> {
    if let Some((_, target)) = REFERENCE_ALIASES.iter().find(|(name, _)| *name == field) {
        return Some(EntityName::from(*target));
    }
    let base = field.strip_suffix("Id")?;
    let first = base.chars().next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    Some(EntityName::new(format!("{base}s")))
}

/// True for the raw primary-key field in any casing backends use.
pub fn is_primary_key(field: &str) -> bool {
    field.eq_ignore_ascii_case(PRIMARY_KEY)
}

/// Backend field name for predicate strings: strip a trailing `Id` and
/// title-case the base (`departmentId` -> `Department`, `name` -> `Name`).
pub fn server_field_name(key: &str) -> String {
    let base = match key.strip_suffix("Id") {
        Some(base) if !base.is_empty() => base,
        _ => key,
    };
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Find a schema field in a record whose keys may be camelCase.
///
/// Exact match first, then a case-insensitive match, so `DepartmentId` finds
/// a backend key `departmentId`.
pub fn lookup_field<'a>(
    record: &'a Record,
    field: &str,
) -> Option<(&'a String, &'a serde_json::Value)> {
    record
        .get_key_value(field)
        .or_else(|| record.iter().find(|(k, _)| k.eq_ignore_ascii_case(field)))
}

/// Raw primary-key value of a record, if any.
pub fn record_id(record: &Record) -> Option<crate::RawId> {
    lookup_field(record, PRIMARY_KEY).and_then(|(_, v)| crate::RawId::from_value(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convention_pluralizes_base() {
        assert_eq!(
            referenced_entity_by_convention("DepartmentId"),
            Some(EntityName::from("Departments"))
        );
        assert_eq!(
            referenced_entity_by_convention("EquipmentTypeId"),
            Some(EntityName::from("EquipmentTypes"))
        );
    }

    #[test]
    fn test_convention_exceptions() {
        assert_eq!(
            referenced_entity_by_convention("SourceDepartmentId"),
            Some(EntityName::from("Departments"))
        );
        assert_eq!(
            referenced_entity_by_convention("TargetDepartmentId"),
            Some(EntityName::from("Departments"))
        );
    }

    #[test]
    fn test_convention_is_case_sensitive() {
        assert_eq!(referenced_entity_by_convention("departmentId"), None);
        assert_eq!(referenced_entity_by_convention("DepartmentID"), None);
        assert_eq!(referenced_entity_by_convention("Id"), None);
        assert_eq!(referenced_entity_by_convention("Name"), None);
    }

    #[test]
    fn test_server_field_name() {
        assert_eq!(server_field_name("departmentId"), "Department");
        assert_eq!(server_field_name("DepartmentId"), "Department");
        assert_eq!(server_field_name("name"), "Name");
        assert_eq!(server_field_name("Id"), "Id");
        assert_eq!(server_field_name(""), "");
    }

    #[test]
    fn test_lookup_field_accepts_camel_case_keys() {
        let record = json!({"id": "e1", "departmentId": "d1"});
        let record = record.as_object().unwrap();
        let (key, value) = lookup_field(record, "DepartmentId").unwrap();
        assert_eq!(key, "departmentId");
        assert_eq!(value, &json!("d1"));
        assert_eq!(record_id(record), Some(crate::RawId::new("e1")));
    }
}
