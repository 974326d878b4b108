//! Create/edit forms: field listing, validation, payload preparation and
//! foreign-key dropdown options.
//!
//! Validation returns every failing field at once as [`FieldErrors`].
//! Payload preparation follows the submission rules of the access overlay:
//! readonly fields are never sent, role-hidden foreign keys pointing at the
//! signed-in user's own entity are filled from the session, and other hidden
//! fields keep their current value.

use crate::scalar::{is_blank, parse_date, parse_number, to_rfc3339};
use gestek_core::naming::{is_primary_key, PRIMARY_KEY, VISUAL_ID};
use gestek_core::table::value_text;
use gestek_core::{
    AccessMatrix, CodedEnum, DestinyType, EntityDef, EnumSpec, EquipmentState, FieldDef,
    FieldErrors, FieldKind, LocationType, RawId, Record, Row, SchemaRegistry, Session, Table,
};
use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Field name → entered value.
pub type FormValues = BTreeMap<String, Value>;

const REQUIRED: &str = "This field is required";
const TOO_SHORT: &str = "The field must be at least 3 characters long.";
const NOT_A_NUMBER: &str = "This field must be a valid number";
const NEGATIVE: &str = "This field cannot be negative";
const NOT_INTEGER: &str = "This field must be an integer value";
const NOT_A_DATE: &str = "This field must be a valid date";
const INVALID_OPTION: &str = "Select a valid option";

fn value_of<'v>(values: &'v FormValues, field: &str) -> Option<&'v Value> {
    values
        .get(field)
        .or_else(|| values.iter().find(|(k, _)| k.eq_ignore_ascii_case(field)).map(|(_, v)| v))
}

fn present(values: &FormValues, field: &str) -> bool {
    value_of(values, field).is_some_and(|v| !is_blank(v))
}

/// Enum code from a label or a numeric code.
fn enum_code(spec: EnumSpec, value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().filter(|code| spec.label_of(*code).is_some()),
        Value::String(s) => spec
            .code_of(s)
            .or_else(|| s.trim().parse::<i64>().ok().filter(|c| spec.label_of(*c).is_some())),
        _ => None,
    }
}

fn enum_value<E: CodedEnum>(values: &FormValues, field: &str) -> Option<E> {
    value_of(values, field)
        .and_then(|v| enum_code(E::SPEC, v))
        .and_then(E::from_code)
}

// ============================================================================
// FIELD LISTING
// ============================================================================

/// Form title: `Create new Department` / `Edit Department`.
pub fn form_title(def: &EntityDef, editing: bool) -> String {
    let singular = def.entity_name().singular().to_string();
    if editing {
        format!("Edit {singular}")
    } else {
        format!("Create new {singular}")
    }
}

/// Fields rendered in the form for `role`: every data field that is neither
/// schema-hidden nor hidden for the role. Readonly fields are listed and
/// rendered disabled.
pub fn form_fields<'d>(def: &'d EntityDef, access: &AccessMatrix, role: &str) -> Vec<&'d FieldDef> {
    let hidden = access.hidden_columns(role, def.name);
    def.data_fields()
        .filter(|f| !f.hidden && !hidden.contains(f.name))
        .collect()
}

/// Initial values: blank for create, the row's raw values for edit.
pub fn initial_values(def: &EntityDef, row: Option<&Row>) -> FormValues {
    def.data_fields()
        .map(|field| {
            let value = row
                .and_then(|r| r.cell(field.name))
                .map(|cell| cell.value().clone())
                .filter(|v| !v.is_null())
                .unwrap_or_else(|| Value::String(String::new()));
            (field.name.to_string(), value)
        })
        .collect()
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate form values for `entity` as entered by `role`.
///
/// Unknown entities have nothing to check. Readonly and role-hidden fields
/// are skipped; hidden fields are filled in at payload time.
pub fn validate_form(
    schema: &SchemaRegistry,
    access: &AccessMatrix,
    role: &str,
    entity: &str,
    values: &FormValues,
) -> Result<(), FieldErrors> {
    let Ok(def) = schema.get_metadata(entity) else {
        return Ok(());
    };
    let hidden = access.hidden_columns(role, entity);
    let mut errors = FieldErrors::new();

    for field in def.data_fields().filter(|f| !f.readonly && !hidden.contains(f.name)) {
        let value = value_of(values, field.name).unwrap_or(&Value::Null);
        if is_blank(value) {
            if field.required {
                errors.insert(field.name, REQUIRED);
            }
            continue;
        }
        if let Some(message) = check_field(field, value) {
            errors.insert(field.name, message);
        }
    }

    match entity {
        "Equipments" => check_equipment_location(values, &mut errors),
        "EquipmentDecommissions" => check_decommission_destiny(values, &mut errors),
        _ => {}
    }

    // Cross-field rules never report on fields the role cannot see.
    let mut visible = FieldErrors::new();
    for (field, message) in errors.iter() {
        if !hidden.contains(field) {
            visible.insert(field, message);
        }
    }
    visible.into_result()
}

fn check_field(field: &FieldDef, value: &Value) -> Option<&'static str> {
    match field.kind {
        FieldKind::String => (value_text(value).trim().chars().count() < 3).then_some(TOO_SHORT),
        FieldKind::Number => match parse_number(value) {
            None => Some(NOT_A_NUMBER),
            Some(n) if n < 0.0 => Some(NEGATIVE),
            Some(n) if field.integer && n.fract() != 0.0 => Some(NOT_INTEGER),
            Some(_) => None,
        },
        FieldKind::Date => parse_date(&value_text(value)).is_none().then_some(NOT_A_DATE),
        FieldKind::Enum(spec) => enum_code(spec, value).is_none().then_some(INVALID_OPTION),
        FieldKind::ForeignKey(_) => RawId::from_value(value).is_none().then_some(INVALID_OPTION),
    }
}

fn check_equipment_location(values: &FormValues, errors: &mut FieldErrors) {
    let location = enum_value::<LocationType>(values, "LocationTypeId");
    let state = enum_value::<EquipmentState>(values, "StateId");
    let has_department = present(values, "DepartmentId");
    let in_department = location == Some(LocationType::Department);

    if in_department && !has_department {
        errors.insert(
            "DepartmentId",
            "This field is required when Location Type is Department",
        );
    }
    if !in_department && has_department {
        errors.insert(
            "DepartmentId",
            "This field must be empty when Location Type is not Department",
        );
    }

    match state {
        Some(EquipmentState::Operative | EquipmentState::UnderMaintenance) => {
            if !in_department {
                errors.insert(
                    "LocationTypeId",
                    "Location Type must be Department for Operative or Under Maintenance equipments",
                );
            }
            if !has_department {
                errors.insert(
                    "DepartmentId",
                    "This field is required for Operative or Under Maintenance equipments",
                );
            }
        }
        Some(EquipmentState::Decommissioned) if location != Some(LocationType::Warehouse) => {
            errors.insert(
                "LocationTypeId",
                "Location Type must be Warehouse for Decommissioned equipments",
            );
        }
        Some(EquipmentState::Disposed) if location != Some(LocationType::Disposal) => {
            errors.insert(
                "LocationTypeId",
                "Location Type must be Disposal for Disposed equipments",
            );
        }
        _ => {}
    }
}

fn check_decommission_destiny(values: &FormValues, errors: &mut FieldErrors) {
    let to_department =
        enum_value::<DestinyType>(values, "DestinyTypeId") == Some(DestinyType::Department);
    let has_department = present(values, "DepartmentId");
    let has_recipient = present(values, "RecipientId");

    if to_department {
        if !has_department {
            errors.insert("DepartmentId", "DepartmentId is required for Department destiny");
        }
        if !has_recipient {
            errors.insert("RecipientId", "RecipientId is required for Department destiny");
        }
    } else {
        if has_department {
            errors.insert(
                "DepartmentId",
                "DepartmentId must be empty for non-Department destiny",
            );
        }
        if has_recipient {
            errors.insert(
                "RecipientId",
                "RecipientId must be empty for non-Department destiny",
            );
        }
    }
}

// ============================================================================
// PAYLOAD
// ============================================================================

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn convert(field: &FieldDef, value: Option<&Value>) -> Value {
    let value = match value {
        Some(v) if !is_blank(v) => v,
        Some(Value::String(s)) if field.kind == FieldKind::String => {
            return Value::String(s.clone())
        }
        _ => return Value::Null,
    };
    match field.kind {
        FieldKind::ForeignKey(_) => RawId::from_value(value)
            .map(|id| id.to_value())
            .unwrap_or(Value::Null),
        FieldKind::Date => parse_date(&value_text(value))
            .map(|d| Value::String(to_rfc3339(d)))
            .unwrap_or(Value::Null),
        FieldKind::Number => parse_number(value).map(number_value).unwrap_or(Value::Null),
        FieldKind::Enum(spec) => enum_code(spec, value).map(Value::from).unwrap_or(Value::Null),
        FieldKind::String => value.clone(),
    }
}

/// Backend payload for a create (`editing = None`) or update.
///
/// Unknown entities pass the values through unchanged.
pub fn prepare_payload(
    schema: &SchemaRegistry,
    access: &AccessMatrix,
    session: &Session,
    entity: &str,
    values: &FormValues,
    editing: Option<&RawId>,
) -> Record {
    let mut payload = Record::new();
    let Ok(def) = schema.get_metadata(entity) else {
        for (key, value) in values {
            payload.insert(key.clone(), value.clone());
        }
        if let Some(id) = editing {
            payload.insert(PRIMARY_KEY.to_string(), id.to_value());
        }
        return payload;
    };

    let config = access.role_config(&session.role);
    let self_entity = config.role.self_entity();
    let hidden: BTreeSet<String> = access.hidden_columns(&session.role, entity);

    for field in def.data_fields().filter(|f| !f.readonly) {
        let current = value_of(values, field.name);
        if field.hidden || hidden.contains(field.name) {
            let own_reference = matches!(
                field.kind,
                FieldKind::ForeignKey(target) if Some(target) == self_entity
            );
            if own_reference {
                payload.insert(field.name.to_string(), Value::String(session.id.clone()));
            } else if let Some(current) = current.filter(|v| !is_blank(v)) {
                payload.insert(field.name.to_string(), convert(field, Some(current)));
            }
            continue;
        }
        payload.insert(field.name.to_string(), convert(field, current));
    }

    if let Some(id) = editing {
        payload.insert(PRIMARY_KEY.to_string(), id.to_value());
    }
    payload
}

// ============================================================================
// FK OPTIONS
// ============================================================================

/// One dropdown entry for a foreign-key field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FkOption {
    pub value: RawId,
    pub label: String,
}

/// Column used to label rows of `table`: the first containing `name` or
/// `title`, else the first data column.
pub fn label_column(table: &Table) -> Option<&str> {
    let data = || {
        table
            .columns
            .iter()
            .filter(|c| c.as_str() != VISUAL_ID && !is_primary_key(c))
    };
    data()
        .find(|c| {
            let lower = c.to_lowercase();
            lower.contains("name") || lower.contains("title")
        })
        .or_else(|| data().next())
        .map(String::as_str)
}

/// Options for a dropdown referencing `table`, labelled
/// `"<visualId> - <label>"`. Rows without a raw id are skipped.
pub fn fk_options(table: &Table) -> Vec<FkOption> {
    let column = label_column(table);
    table
        .rows
        .iter()
        .filter_map(|row| {
            let id = row.id.clone()?;
            let text = column.map(|c| row.text(c)).unwrap_or_default();
            let text = if text.is_empty() { "Item".to_string() } else { text };
            Some(FkOption {
                value: id,
                label: format!("{} - {}", row.visual_id, text),
            })
        })
        .collect()
}
