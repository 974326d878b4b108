//! Integration Tests for the Dashboard
//!
//! Drives a [`Dashboard`] against the seeded in-memory backend: loading,
//! filtering on both paths, navigation and role-gated CRUD.

use gestek_core::{naming::record_id, EntityName, RawId, Session};
use gestek_dashboard::{Dashboard, DashboardConfig, DashboardError};
use gestek_grid::FormValues;
use gestek_test_utils::{fixtures, ServiceOp, StorageError, TestBackend};
use serde_json::{json, Value};
use std::io::Write;

// ============================================================================
// TEST SETUP
// ============================================================================

async fn dashboard(backend: &TestBackend, session: Session) -> Dashboard {
    let mut dashboard =
        Dashboard::new(session, backend.registry.clone(), &DashboardConfig::default()).unwrap();
    dashboard.load().await;
    dashboard
}

fn form(value: Value) -> FormValues {
    value
        .as_object()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn page_ids(dashboard: &Dashboard) -> Vec<String> {
    dashboard
        .page()
        .unwrap()
        .rows
        .iter()
        .filter_map(|row| row.id.as_ref().map(|id| id.to_string()))
        .collect()
}

// ============================================================================
// LOADING
// ============================================================================

#[tokio::test]
async fn test_admin_loads_every_table() {
    let backend = TestBackend::seeded();
    let dashboard = dashboard(&backend, fixtures::admin_session()).await;

    assert_eq!(dashboard.title(), "Administrator Dashboard");
    assert_eq!(dashboard.visible_tables().len(), 14);
    assert!(dashboard.errors().is_empty());
    assert!(dashboard.can_export_reports());
}

#[tokio::test]
async fn test_unknown_role_gets_fallback_view() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, Session::new("x", "Guest", "Visitor")).await;

    let employee = gestek_core::ACCESS.allowed_entities("Employee").len();
    assert_eq!(dashboard.visible_tables().len(), employee);
    assert!(dashboard.select_table("Users").unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn test_fetch_failure_is_listed_and_dismissible() {
    let backend = TestBackend::seeded();
    backend
        .service("Sections")
        .unwrap()
        .fail_on(
            ServiceOp::Get,
            StorageError::Unavailable {
                entity: EntityName::from("Sections"),
                reason: "connection reset".to_string(),
            },
        )
        .await;
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;

    assert!(dashboard.tables().get("Sections").unwrap().is_empty());
    assert_eq!(dashboard.tables().get("Departments").unwrap().len(), 3);
    assert_eq!(dashboard.errors().len(), 1);

    let id = dashboard.errors().latest().unwrap().id;
    assert!(dashboard.dismiss_error(id));
    assert!(dashboard.errors().is_empty());
}

// ============================================================================
// FILTERING AND NAVIGATION
// ============================================================================

#[tokio::test]
async fn test_server_filters_keep_visual_ids() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;
    dashboard.select_table("Equipments").unwrap();

    dashboard.set_filter("Name", "scanner");
    dashboard.set_filter("DepartmentId.Name", "radio");
    assert_eq!(dashboard.apply_server_filters().await.unwrap(), 2);
    assert_eq!(page_ids(&dashboard), vec!["e2", "e4"]);

    // Comparator patterns stay local and run over the server result.
    dashboard.set_filter("visualId", ">3");
    dashboard.apply_server_filters().await.unwrap();
    let page = dashboard.page().unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].visual_id, 4);
}

#[tokio::test]
async fn test_server_filter_with_no_foreign_match() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;
    dashboard.select_table("Equipments").unwrap();

    dashboard.set_filter("DepartmentId.Name", "dermatology");
    assert_eq!(dashboard.apply_server_filters().await.unwrap(), 0);
    assert!(page_ids(&dashboard).is_empty());

    dashboard.clear_filters();
    assert!(!dashboard.has_server_result());
    assert_eq!(page_ids(&dashboard).len(), 5);
}

#[tokio::test]
async fn test_client_filters_and_paging() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;
    dashboard.select_table("Equipments").unwrap();
    assert!(!dashboard.set_page_size(3));
    assert!(dashboard.set_page_size(5));

    dashboard.set_filter("DepartmentId.Name", "card");
    assert_eq!(page_ids(&dashboard), vec!["e1", "e5"]);
    assert_eq!(dashboard.total_pages().unwrap(), 1);

    dashboard.set_page(4).unwrap();
    assert_eq!(dashboard.view().page(), 1);
}

#[tokio::test]
async fn test_follow_reference_selects_target_row() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;
    dashboard.select_table("Maintenances").unwrap();
    dashboard.set_filter("Cost", ">100");

    dashboard.follow_reference(2, "EquipmentId").unwrap();
    assert_eq!(dashboard.current_table().unwrap().name.as_str(), "Equipments");
    assert!(dashboard.view().is_selected(2));
    assert!(dashboard.view().filters().is_empty());

    dashboard.select_table("Maintenances").unwrap();
    // m4 points at a missing equipment.
    match dashboard.follow_reference(4, "EquipmentId") {
        Err(DashboardError::DanglingReference { entity, id }) => {
            assert_eq!(entity, "Equipments");
            assert_eq!(id, "e99");
        }
        other => panic!("expected dangling reference, got {other:?}"),
    }
    assert!(matches!(
        dashboard.follow_reference(40, "EquipmentId"),
        Err(DashboardError::RowNotFound { visual_id: 40, .. })
    ));
}

#[tokio::test]
async fn test_technical_hidden_columns() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::technical_session()).await;
    dashboard.select_table("Maintenances").unwrap();

    assert!(!dashboard.visible_columns().iter().any(|c| c == "TechnicalId"));
    assert!(!dashboard.is_read_only());
    dashboard.select_table("Equipments").unwrap();
    assert!(dashboard.is_read_only());
}

// ============================================================================
// FORMS AND CRUD
// ============================================================================

#[tokio::test]
async fn test_fk_options_use_unscoped_collection() {
    let backend = TestBackend::seeded();
    backend
        .service("Departments")
        .unwrap()
        .set_scope([RawId::new("d1")])
        .await;
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;
    assert_eq!(dashboard.tables().get("Departments").unwrap().len(), 1);

    dashboard.select_table("Equipments").unwrap();
    let options = dashboard.fk_options("DepartmentId").await.unwrap();
    let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["1 - Cardiology", "2 - Radiology", "3 - Oncology"]);

    assert!(dashboard.fk_options("Name").await.is_err());
}

#[tokio::test]
async fn test_technical_create_fills_own_id() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::technical_session()).await;
    dashboard.select_table("Maintenances").unwrap();

    let created = dashboard
        .create(&form(json!({
            "EquipmentId": "e1",
            "MaintenanceDate": "2024-10-01",
            "MaintenanceTypeId": "Preventive",
            "Cost": 120
        })))
        .await
        .unwrap();

    assert_eq!(created["TechnicalId"], json!("tech1"));
    assert_eq!(created["MaintenanceTypeId"], json!(0));
    assert_eq!(created["Cost"], json!(120));
    assert_eq!(created["MaintenanceDate"], json!("2024-10-01T00:00:00.000Z"));

    let table = dashboard.tables().get("Maintenances").unwrap();
    assert_eq!(table.len(), 5);
    let id = record_id(&created).unwrap();
    assert!(table.row_by_id(id.as_str()).is_some());
}

#[tokio::test]
async fn test_invalid_form_reports_every_field() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::technical_session()).await;
    dashboard.select_table("Maintenances").unwrap();

    let err = dashboard
        .create(&form(json!({"Cost": -5, "MaintenanceDate": "someday"})))
        .await
        .unwrap_err();
    let fields = err.field_errors().unwrap();
    assert!(fields.contains("EquipmentId"));
    assert!(fields.contains("MaintenanceTypeId"));
    assert_eq!(fields.get("Cost"), Some("This field cannot be negative"));
    assert_eq!(fields.get("MaintenanceDate"), Some("This field must be a valid date"));
    assert!(!fields.contains("TechnicalId"));
    assert_eq!(backend.service("Maintenances").unwrap().len().await, 4);
}

#[tokio::test]
async fn test_read_only_role_is_denied() {
    let backend = TestBackend::seeded();
    let director = Session::new("dir1", "Marta Gil", "Director");
    let mut dashboard = dashboard(&backend, director).await;
    dashboard.select_table("Maintenances").unwrap();
    assert!(dashboard.is_read_only());

    let err = dashboard.delete(1).await.unwrap_err();
    assert!(err.is_permission_denied());
    let err = dashboard.create(&FormValues::new()).await.unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(backend.service("Maintenances").unwrap().len().await, 4);
}

#[tokio::test]
async fn test_backend_rejection_surfaces_as_operation_error() {
    let backend = TestBackend::seeded();
    let sections = backend.service("Sections").unwrap();
    sections
        .fail_on(
            ServiceOp::Update,
            StorageError::Rejected {
                entity: EntityName::from("Sections"),
                reason: "name taken".to_string(),
            },
        )
        .await;
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;
    dashboard.select_table("Sections").unwrap();

    let err = dashboard
        .update(1, &form(json!({"Name": "East Wing"})))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DashboardError::Grid(gestek_core::GestekError::Operation(_))
    ));
    assert_eq!(dashboard.errors().len(), 1);

    sections.recover(ServiceOp::Update).await;
    dashboard
        .update(1, &form(json!({"Name": "East Wing"})))
        .await
        .unwrap();
    let table = dashboard.tables().get("Sections").unwrap();
    assert_eq!(table.row_by_id("s1").unwrap().text("Name"), "East Wing");
}

#[tokio::test]
async fn test_admin_delete_reloads_and_dangles() {
    let backend = TestBackend::seeded();
    let mut dashboard = dashboard(&backend, fixtures::admin_session()).await;
    dashboard.select_table("Equipments").unwrap();

    // e1 is row 1 and referenced by m1.
    dashboard.delete(1).await.unwrap();
    assert_eq!(dashboard.tables().get("Equipments").unwrap().len(), 4);

    let maintenances = dashboard.tables().get("Maintenances").unwrap();
    assert_eq!(maintenances.row_by_id("m1").unwrap().text("EquipmentId"), "e1");
    assert_eq!(maintenances.row_by_id("m2").unwrap().text("EquipmentId"), "1");
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_dashboard_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[grid]
default_page_size = 5
visual_id_order = "primary_key"

[logging]
directive = "gestek=debug"
"#
    )
    .unwrap();
    let config = DashboardConfig::from_path(file.path()).unwrap();

    let backend = TestBackend::seeded();
    let mut dashboard =
        Dashboard::new(fixtures::admin_session(), backend.registry.clone(), &config).unwrap();
    dashboard.load().await;
    dashboard.select_table("Equipments").unwrap();

    assert_eq!(dashboard.view().page_size(), 5);
    assert_eq!(page_ids(&dashboard), vec!["e1", "e2", "e3", "e4", "e5"]);
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = DashboardConfig::from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, gestek_dashboard::ConfigLoadError::Io(_)));
}
