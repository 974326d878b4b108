//! GesTecK Test Utilities
//!
//! Shared test infrastructure for the GesTecK workspace:
//! - Fixture records for every built-in entity
//! - A seeded in-memory backend
//! - Proptest generators for record batches, filters and roles
//! - Assertions over materialized tables

pub use gestek_storage::{InMemoryEntityService, ServiceOp, ServiceRegistry, StorageError};

pub use gestek_core::{EntityName, RawId, Record, Role, Session, Table, TableSet};

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Convert a JSON object literal into a record. Non-objects yield an empty
/// record.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Convert a JSON array of objects into records.
pub fn records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items.into_iter().map(record).collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixture records forming a small, referentially complete hospital.
    //!
    //! Ids are short readable strings (`d1`, `e3`). `e3` has no department,
    //! `m4` points at an equipment that does not exist.

    use super::*;
    use serde_json::json;

    pub fn sections() -> Vec<Record> {
        records(json!([
            {"Id": "s1", "Name": "North Wing"},
            {"Id": "s2", "Name": "South Wing"}
        ]))
    }

    pub fn departments() -> Vec<Record> {
        records(json!([
            {"Id": "d1", "Name": "Cardiology", "SectionId": "s1"},
            {"Id": "d2", "Name": "Radiology", "SectionId": "s1"},
            {"Id": "d3", "Name": "Oncology", "SectionId": "s2"}
        ]))
    }

    pub fn equipment_types() -> Vec<Record> {
        records(json!([
            {"Id": "t1", "Name": "Monitors", "EquipmentCount": 2},
            {"Id": "t2", "Name": "Imaging", "EquipmentCount": 3}
        ]))
    }

    pub fn equipments() -> Vec<Record> {
        records(json!([
            {"Id": "e1", "Name": "ECG Monitor", "AcquisitionDate": "2021-05-01T00:00:00Z",
             "EquipmentTypeId": "t1", "DepartmentId": "d1", "StateId": 0, "LocationTypeId": 0},
            {"Id": "e2", "Name": "MRI Scanner", "AcquisitionDate": "2023-01-15T00:00:00Z",
             "EquipmentTypeId": "t2", "DepartmentId": "d2", "StateId": 1, "LocationTypeId": 0},
            {"Id": "e3", "Name": "Old X-Ray", "AcquisitionDate": "2012-09-20T00:00:00Z",
             "EquipmentTypeId": "t2", "DepartmentId": null, "StateId": 2, "LocationTypeId": 1},
            {"Id": "e4", "Name": "CT Scanner", "AcquisitionDate": "2024-07-30T00:00:00Z",
             "EquipmentTypeId": "t2", "DepartmentId": "d2", "StateId": 0, "LocationTypeId": 0},
            {"Id": "e5", "Name": "Holter Monitor", "AcquisitionDate": "2022-03-11T00:00:00Z",
             "EquipmentTypeId": "t1", "DepartmentId": "d1", "StateId": 0, "LocationTypeId": 0}
        ]))
    }

    pub fn responsibles() -> Vec<Record> {
        records(json!([
            {"Id": "r1", "Name": "Rosa Diaz", "Email": "rosa@gmail.com", "DepartmentId": "d1"}
        ]))
    }

    pub fn directors() -> Vec<Record> {
        records(json!([
            {"Id": "dir1", "Name": "Marta Gil", "Email": "marta@gmail.com"}
        ]))
    }

    pub fn technicals() -> Vec<Record> {
        records(json!([
            {"Id": "tech1", "Name": "Ana Ruiz", "Email": "ana@gmail.com",
             "Speciality": "Imaging", "Experience": 6},
            {"Id": "tech2", "Name": "Luis Vera", "Email": "luis@gmail.com",
             "Speciality": "Cardio", "Experience": 2}
        ]))
    }

    pub fn employees() -> Vec<Record> {
        records(json!([
            {"Id": "emp1", "Name": "Pablo Sanz", "Email": "pablo@gmail.com", "DepartmentId": "d1"}
        ]))
    }

    pub fn assessments() -> Vec<Record> {
        records(json!([
            {"Id": "a1", "TechnicalId": "tech1", "DirectorId": "dir1", "Score": 8,
             "Comment": "Reliable", "AssessmentDate": "2024-02-01T00:00:00Z"}
        ]))
    }

    pub fn maintenances() -> Vec<Record> {
        records(json!([
            {"Id": "m1", "EquipmentId": "e1", "TechnicalId": "tech1",
             "MaintenanceDate": "2024-01-10T00:00:00Z", "MaintenanceTypeId": 0, "Cost": 150},
            {"Id": "m2", "EquipmentId": "e2", "TechnicalId": "tech2",
             "MaintenanceDate": "2024-03-05T00:00:00Z", "MaintenanceTypeId": 1, "Cost": 900.5},
            {"Id": "m3", "EquipmentId": "e4", "TechnicalId": "tech1",
             "MaintenanceDate": "2024-08-01T00:00:00Z", "MaintenanceTypeId": 2, "Cost": 200},
            {"Id": "m4", "EquipmentId": "e99", "TechnicalId": "tech2",
             "MaintenanceDate": "2024-09-01T00:00:00Z", "MaintenanceTypeId": 0, "Cost": 50}
        ]))
    }

    pub fn transfers() -> Vec<Record> {
        records(json!([
            {"Id": "tr1", "EquipmentId": "e4", "SourceDepartmentId": "d1",
             "TargetDepartmentId": "d2", "ResponsibleId": "r1",
             "TransferDate": "2024-07-31T00:00:00Z"}
        ]))
    }

    pub fn transfer_requests() -> Vec<Record> {
        records(json!([
            {"Id": "rq1", "EquipmentId": "e5", "RequesterId": "r1", "TargetDepartmentId": "d3",
             "RequestDate": "2024-10-01T00:00:00Z", "StatusId": 0}
        ]))
    }

    pub fn equipment_decommissions() -> Vec<Record> {
        records(json!([
            {"Id": "dc1", "EquipmentId": "e3", "TechnicalId": "tech1", "DepartmentId": null,
             "RecipientId": null, "DestinyTypeId": 1, "DecommissionDate": "2023-12-01T00:00:00Z",
             "Reason": "Obsolete hardware"}
        ]))
    }

    pub fn users() -> Vec<Record> {
        records(json!([
            {"Id": "u1", "UserName": "admin", "Email": "admin@gmail.com", "Role": "Administrator"},
            {"Id": "u2", "UserName": "ana", "Email": "ana@gmail.com", "Role": "Technical"}
        ]))
    }

    /// Every built-in entity with its fixture records, in registry order.
    pub fn all() -> Vec<(&'static str, Vec<Record>)> {
        vec![
            ("Sections", sections()),
            ("Departments", departments()),
            ("EquipmentTypes", equipment_types()),
            ("Equipments", equipments()),
            ("Responsibles", responsibles()),
            ("Directors", directors()),
            ("Technicals", technicals()),
            ("Employees", employees()),
            ("Assessments", assessments()),
            ("Maintenances", maintenances()),
            ("Transfers", transfers()),
            ("TransferRequests", transfer_requests()),
            ("EquipmentDecommissions", equipment_decommissions()),
            ("Users", users()),
        ]
    }

    pub fn admin_session() -> Session {
        Session::new("u1", "admin", "Administrator")
    }

    pub fn technical_session() -> Session {
        Session::new("tech1", "Ana Ruiz", "Technical")
    }
}

// ============================================================================
// SEEDED BACKEND
// ============================================================================

/// In-memory services for every fixture entity, kept addressable so tests
/// can inject failures or inspect stored records.
#[derive(Debug, Clone)]
pub struct TestBackend {
    pub registry: ServiceRegistry,
    services: BTreeMap<String, Arc<InMemoryEntityService>>,
}

impl TestBackend {
    /// Backend seeded with [`fixtures::all`].
    pub fn seeded() -> Self {
        Self::from_records(fixtures::all())
    }

    pub fn from_records(entities: Vec<(&'static str, Vec<Record>)>) -> Self {
        let mut registry = ServiceRegistry::new();
        let mut services = BTreeMap::new();
        for (entity, rows) in entities {
            let service = Arc::new(InMemoryEntityService::with_records(entity, rows));
            registry.register(service.clone());
            services.insert(entity.to_string(), service);
        }
        Self { registry, services }
    }

    pub fn service(&self, entity: &str) -> Option<Arc<InMemoryEntityService>> {
        self.services.get(entity).cloned()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for record batches, filters and roles.

    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const WORDS: &[&str] = &[
        "Cardiology", "Radiology", "Oncology", "Pediatrics", "Neurology", "Surgery",
        "Monitor", "Scanner", "Pump", "Ventilator",
    ];

    /// A name drawn from a small vocabulary, so substring filters hit often.
    pub fn arb_name() -> impl Strategy<Value = String> {
        (prop::sample::select(WORDS), 0u32..100).prop_map(|(word, n)| format!("{word} {n}"))
    }

    /// Department records with ids `d0..dN`.
    pub fn arb_departments(max: usize) -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(arb_name(), 0..=max).prop_map(|names| {
            names
                .into_iter()
                .enumerate()
                .map(|(i, name)| {
                    record(json!({"Id": format!("d{i}"), "Name": name, "SectionId": "s1"}))
                })
                .collect()
        })
    }

    /// Equipment records referencing departments `d0..d{departments + 2}`;
    /// the ids past the end dangle.
    pub fn arb_equipments(departments: usize, max: usize) -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(
            (arb_name(), prop::option::of(0..departments + 3), 0i64..4),
            0..=max,
        )
        .prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (name, department, state))| {
                    let department = department.map(|d| format!("d{d}"));
                    record(json!({
                        "Id": format!("e{i}"),
                        "Name": name,
                        "AcquisitionDate": "2024-01-01T00:00:00Z",
                        "EquipmentTypeId": "t1",
                        "DepartmentId": department,
                        "StateId": state,
                        "LocationTypeId": 0
                    }))
                })
                .collect()
        })
    }

    /// Departments and equipments referencing them, generated together.
    pub fn arb_equipment_batch() -> impl Strategy<Value = (Vec<Record>, Vec<Record>)> {
        (0usize..8).prop_flat_map(|n| (arb_departments(n), arb_equipments(n, 30)))
    }

    /// Text patterns, including comparator prefixes and blanks.
    pub fn arb_pattern() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(WORDS).prop_map(|w| w.to_lowercase()),
            "[a-z]{0,3}",
            (prop::sample::select(vec![">", "<", ">=", "<="]), 0u32..5000)
                .prop_map(|(op, n)| format!("{op}{n}")),
            Just(String::new()),
        ]
    }

    /// Role strings, including ones no matrix knows.
    pub fn arb_role_string() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(Role::ALL.to_vec()).prop_map(|r| r.to_string()),
            "[A-Za-z]{0,10}",
        ]
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over materialized tables.

    use super::*;
    use gestek_core::Cell;

    /// Every FK cell is unresolved or points at a real row of its reference.
    pub fn assert_references_consistent(tables: &TableSet) {
        for table in tables.iter() {
            for row in &table.rows {
                for (column, fk) in row.foreign_cells() {
                    let Some(visual) = fk.visual else { continue };
                    let target = tables.get(fk.reference.as_str()).unwrap_or_else(|| {
                        panic!(
                            "{}.{column} resolved into missing table {}",
                            table.name, fk.reference
                        )
                    });
                    let hit = target.row_by_visual(visual).unwrap_or_else(|| {
                        panic!("{}.{column} resolved to unknown visualId {visual}", table.name)
                    });
                    assert_eq!(
                        hit.id.as_ref().map(RawId::as_str),
                        fk.raw_id().as_ref().map(RawId::as_str),
                        "{}.{column} resolved to the wrong row",
                        table.name
                    );
                }
            }
        }
    }

    /// `visualId`s are exactly 1..=N in row order.
    pub fn assert_dense_visual_ids(table: &Table) {
        let ids: Vec<usize> = table.rows.iter().map(|r| r.visual_id).collect();
        let expected: Vec<usize> = (1..=table.rows.len()).collect();
        assert_eq!(ids, expected, "{} visual ids not dense", table.name);
    }

    /// Raw FK value of `column` in the row with raw id `id`.
    pub fn fk_value(table: &Table, id: &str, column: &str) -> Option<String> {
        table
            .row_by_id(id)
            .and_then(|row| row.cell(column))
            .and_then(Cell::as_foreign)
            .and_then(|fk| fk.raw_id())
            .map(|id| id.to_string())
    }
}
