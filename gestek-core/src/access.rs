//! Role Access Overlay
//!
//! One capability matrix answers every "may this role see/do X on entity Y"
//! question through [`AccessMatrix::grant`]. The overlay only decides what the
//! dashboard *offers*; the backend remains the authority on what it accepts.

use crate::enums::Role;
use crate::{AccessError, EntityName};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

// ============================================================================
// CAPABILITY FLAGS
// ============================================================================

bitflags! {
    /// Operations a role may be offered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        const READ = 0b0000_0001;
        const CREATE = 0b0000_0010;
        const EDIT = 0b0000_0100;
        const DELETE = 0b0000_1000;
        const EXPORT_REPORTS = 0b0001_0000;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// ROLE CONFIGURATION
// ============================================================================

/// Static per-role configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub role: Role,
    pub dashboard_title: String,
    /// Entities the role may load, in selector display order.
    pub allowed_entities: Vec<EntityName>,
    /// Role-wide create/edit/delete/export flags.
    pub capabilities: Capabilities,
    /// Allowed entities on which no write operation is offered regardless of
    /// the role-wide flags.
    #[serde(default)]
    pub read_only_entities: BTreeSet<EntityName>,
    #[serde(default)]
    pub hidden_columns: BTreeMap<EntityName, BTreeSet<String>>,
}

impl RoleConfig {
    pub fn allows(&self, entity: &str) -> bool {
        self.allowed_entities.iter().any(|e| e == entity)
    }

    /// `read_only_entities` and `hidden_columns` keys must be allowed.
    pub fn validate(&self) -> Result<(), AccessError> {
        let stray = self
            .read_only_entities
            .iter()
            .chain(self.hidden_columns.keys())
            .find(|e| !self.allows(e.as_str()));
        match stray {
            Some(entity) => Err(AccessError::InvalidRoleConfig {
                role: self.role.to_string(),
                reason: format!("{entity} is configured but not allowed"),
            }),
            None => Ok(()),
        }
    }
}

/// What one role may do with one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityGrant {
    pub role: Role,
    pub entity: EntityName,
    pub capabilities: Capabilities,
    pub hidden_columns: BTreeSet<String>,
}

impl EntityGrant {
    pub fn can_read(&self) -> bool {
        self.capabilities.contains(Capabilities::READ)
    }

    pub fn can_create(&self) -> bool {
        self.capabilities.contains(Capabilities::CREATE)
    }

    pub fn can_edit(&self) -> bool {
        self.capabilities.contains(Capabilities::EDIT)
    }

    pub fn can_delete(&self) -> bool {
        self.capabilities.contains(Capabilities::DELETE)
    }

    /// No write operation is offered.
    pub fn is_read_only(&self) -> bool {
        !self
            .capabilities
            .intersects(Capabilities::CREATE | Capabilities::EDIT | Capabilities::DELETE)
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden_columns.contains(column)
    }
}

// ============================================================================
// MATRIX
// ============================================================================

/// The global access matrix with the built-in roles.
pub static ACCESS: LazyLock<AccessMatrix> = LazyLock::new(AccessMatrix::builtin);

/// Role × entity capability matrix.
#[derive(Debug, Clone)]
pub struct AccessMatrix {
    roles: BTreeMap<Role, RoleConfig>,
    fallback: Role,
}

impl AccessMatrix {
    /// Build a matrix; `fallback` must be one of the configured roles.
    pub fn new(configs: Vec<RoleConfig>, fallback: Role) -> Result<Self, AccessError> {
        let mut roles = BTreeMap::new();
        for config in configs {
            config.validate()?;
            roles.insert(config.role, config);
        }
        if !roles.contains_key(&fallback) {
            return Err(AccessError::InvalidRoleConfig {
                role: fallback.to_string(),
                reason: "fallback role has no configuration".to_string(),
            });
        }
        Ok(Self { roles, fallback })
    }

    pub fn builtin() -> Self {
        let roles = builtin_roles()
            .into_iter()
            .map(|config| (config.role, config))
            .collect();
        Self {
            roles,
            fallback: Role::Employee,
        }
    }

    /// Replace individual role entries, keeping the others.
    pub fn with_overrides(mut self, overrides: Vec<RoleConfig>) -> Result<Self, AccessError> {
        for config in overrides {
            config.validate()?;
            self.roles.insert(config.role, config);
        }
        Ok(self)
    }

    /// Change the role used for unrecognized role strings.
    pub fn with_fallback(mut self, fallback: Role) -> Result<Self, AccessError> {
        if !self.roles.contains_key(&fallback) {
            return Err(AccessError::InvalidRoleConfig {
                role: fallback.to_string(),
                reason: "fallback role has no configuration".to_string(),
            });
        }
        self.fallback = fallback;
        Ok(self)
    }

    pub fn fallback_role(&self) -> Role {
        self.fallback
    }

    /// Configuration for a role string; unknown roles get the fallback
    /// (most restrictive) configuration.
    pub fn role_config(&self, role: &str) -> &RoleConfig {
        role.parse::<Role>()
            .ok()
            .and_then(|r| self.roles.get(&r))
            .unwrap_or_else(|| &self.roles[&self.fallback])
    }

    /// The single capability query every other check delegates to.
    pub fn grant(&self, role: &str, entity: &str) -> EntityGrant {
        let config = self.role_config(role);
        let mut capabilities = Capabilities::empty();
        if config.allows(entity) {
            capabilities |= Capabilities::READ;
            if !config.read_only_entities.contains(entity) {
                capabilities |= config.capabilities
                    & (Capabilities::CREATE | Capabilities::EDIT | Capabilities::DELETE);
            }
        }
        EntityGrant {
            role: config.role,
            entity: EntityName::from(entity),
            capabilities,
            hidden_columns: config.hidden_columns.get(entity).cloned().unwrap_or_default(),
        }
    }

    pub fn allowed_entities(&self, role: &str) -> &[EntityName] {
        &self.role_config(role).allowed_entities
    }

    pub fn is_table_read_only(&self, role: &str, entity: &str) -> bool {
        self.grant(role, entity).is_read_only()
    }

    pub fn hidden_columns(&self, role: &str, entity: &str) -> BTreeSet<String> {
        self.grant(role, entity).hidden_columns
    }

    pub fn can_create(&self, role: &str, entity: &str) -> bool {
        self.grant(role, entity).can_create()
    }

    pub fn can_edit(&self, role: &str, entity: &str) -> bool {
        self.grant(role, entity).can_edit()
    }

    pub fn can_delete(&self, role: &str, entity: &str) -> bool {
        self.grant(role, entity).can_delete()
    }

    pub fn can_export_reports(&self, role: &str) -> bool {
        self.role_config(role)
            .capabilities
            .contains(Capabilities::EXPORT_REPORTS)
    }

    /// Columns left after removing the role's hidden set, order preserved.
    pub fn visible_columns(&self, role: &str, entity: &str, columns: &[String]) -> Vec<String> {
        let grant = self.grant(role, entity);
        columns
            .iter()
            .filter(|c| !grant.is_hidden(c))
            .cloned()
            .collect()
    }
}

// ============================================================================
// BUILT-IN ROLES
// ============================================================================

/// Reference tables every role reads; only administrators modify them.
const CATALOG: &[&str] = &[
    "Sections",
    "Departments",
    "EquipmentTypes",
    "Responsibles",
    "Directors",
    "Technicals",
    "Equipments",
];

fn names(list: &[&str]) -> Vec<EntityName> {
    list.iter().map(|n| EntityName::from(*n)).collect()
}

fn hidden(entries: &[(&str, &str)]) -> BTreeMap<EntityName, BTreeSet<String>> {
    let mut out: BTreeMap<EntityName, BTreeSet<String>> = BTreeMap::new();
    for (entity, column) in entries {
        out.entry(EntityName::from(*entity))
            .or_default()
            .insert(column.to_string());
    }
    out
}

fn builtin_roles() -> Vec<RoleConfig> {
    let director_tables: Vec<EntityName> = CATALOG
        .iter()
        .chain(
            [
                "Employees",
                "Assessments",
                "Maintenances",
                "Transfers",
                "EquipmentDecommissions",
            ]
            .iter(),
        )
        .map(|n| EntityName::from(*n))
        .collect();

    vec![
        RoleConfig {
            role: Role::Administrator,
            dashboard_title: "Administrator Dashboard".to_string(),
            allowed_entities: CATALOG
                .iter()
                .chain(
                    [
                        "Employees",
                        "Assessments",
                        "Maintenances",
                        "Transfers",
                        "TransferRequests",
                        "EquipmentDecommissions",
                        "Users",
                    ]
                    .iter(),
                )
                .map(|n| EntityName::from(*n))
                .collect(),
            capabilities: Capabilities::all(),
            read_only_entities: BTreeSet::new(),
            hidden_columns: BTreeMap::new(),
        },
        RoleConfig {
            role: Role::Director,
            dashboard_title: "Director Dashboard".to_string(),
            read_only_entities: director_tables.iter().cloned().collect(),
            allowed_entities: director_tables,
            capabilities: Capabilities::EXPORT_REPORTS,
            hidden_columns: BTreeMap::new(),
        },
        RoleConfig {
            role: Role::Responsible,
            dashboard_title: "Responsible Dashboard".to_string(),
            allowed_entities: names(&[
                "Sections",
                "Departments",
                "EquipmentTypes",
                "Equipments",
                "Responsibles",
                "Technicals",
                "Employees",
                "Maintenances",
                "EquipmentDecommissions",
                "TransferRequests",
                "Transfers",
            ]),
            capabilities: Capabilities::CREATE | Capabilities::EXPORT_REPORTS,
            read_only_entities: names(&[
                "Sections",
                "Departments",
                "EquipmentTypes",
                "Equipments",
                "Responsibles",
                "Technicals",
                "Employees",
                "Maintenances",
                "EquipmentDecommissions",
                "Transfers",
            ])
            .into_iter()
            .collect(),
            hidden_columns: BTreeMap::new(),
        },
        RoleConfig {
            role: Role::Technical,
            dashboard_title: "Technical Dashboard".to_string(),
            allowed_entities: names(&[
                "Sections",
                "Departments",
                "EquipmentTypes",
                "Equipments",
                "Directors",
                "Employees",
                "Maintenances",
                "Assessments",
                "EquipmentDecommissions",
            ]),
            capabilities: Capabilities::CREATE | Capabilities::EDIT,
            read_only_entities: names(&[
                "Sections",
                "Departments",
                "EquipmentTypes",
                "Equipments",
                "Directors",
                "Employees",
            ])
            .into_iter()
            .collect(),
            // Auto-filled with the signed-in technician.
            hidden_columns: hidden(&[
                ("Maintenances", "TechnicalId"),
                ("Assessments", "TechnicalId"),
                ("EquipmentDecommissions", "TechnicalId"),
            ]),
        },
        RoleConfig {
            role: Role::Employee,
            dashboard_title: "Employee Dashboard".to_string(),
            allowed_entities: names(&["Sections", "Departments", "Equipments", "EquipmentTypes"]),
            capabilities: Capabilities::empty(),
            read_only_entities: names(&["Sections", "Departments", "Equipments", "EquipmentTypes"])
                .into_iter()
                .collect(),
            hidden_columns: BTreeMap::new(),
        },
        RoleConfig {
            role: Role::Receptor,
            dashboard_title: "Receptor Dashboard".to_string(),
            allowed_entities: names(&[
                "Departments",
                "Sections",
                "EquipmentTypes",
                "Equipments",
                "EquipmentDecommissions",
            ]),
            capabilities: Capabilities::empty(),
            read_only_entities: BTreeSet::new(),
            hidden_columns: hidden(&[
                ("Equipments", "DepartmentId"),
                ("Departments", "SectionId"),
                ("EquipmentDecommissions", "RecipientId"),
            ]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(read_only: &[&str], caps: Capabilities) -> RoleConfig {
        RoleConfig {
            role: Role::Technical,
            dashboard_title: "Test".to_string(),
            allowed_entities: names(&["Equipments", "Maintenances"]),
            capabilities: caps,
            read_only_entities: names(read_only).into_iter().collect(),
            hidden_columns: BTreeMap::new(),
        }
    }

    #[test]
    fn test_builtin_roles_are_valid() {
        for config in builtin_roles() {
            assert!(config.validate().is_ok(), "{} invalid", config.role);
        }
    }

    #[test]
    fn test_read_only_entity_overrides_blanket_edit() {
        let matrix = AccessMatrix::new(
            vec![config_with(&["Equipments"], Capabilities::EDIT | Capabilities::DELETE)],
            Role::Technical,
        )
        .unwrap();
        assert!(matrix.is_table_read_only("Technical", "Equipments"));
        assert!(!matrix.can_edit("Technical", "Equipments"));
        assert!(!matrix.can_delete("Technical", "Equipments"));
        assert!(matrix.can_edit("Technical", "Maintenances"));
    }

    #[test]
    fn test_unknown_role_falls_back_to_employee() {
        let config = ACCESS.role_config("Janitor");
        assert_eq!(config.role, Role::Employee);
        assert!(!ACCESS.can_create("Janitor", "Equipments"));
        assert!(!ACCESS.allowed_entities("Janitor").iter().any(|e| e == "Users"));
    }

    #[test]
    fn test_disallowed_entity_grants_nothing() {
        let grant = ACCESS.grant("Employee", "Maintenances");
        assert!(!grant.can_read());
        assert!(grant.is_read_only());
    }

    #[test]
    fn test_technical_hidden_columns() {
        let hidden = ACCESS.hidden_columns("Technical", "Maintenances");
        assert!(hidden.contains("TechnicalId"));
        assert!(ACCESS.hidden_columns("Technical", "Equipments").is_empty());
    }

    #[test]
    fn test_visible_columns_remove_hidden() {
        let cols = vec![
            "visualId".to_string(),
            "Name".to_string(),
            "DepartmentId".to_string(),
        ];
        assert_eq!(
            ACCESS.visible_columns("Receptor", "Equipments", &cols),
            vec!["visualId".to_string(), "Name".to_string()]
        );
    }

    #[test]
    fn test_responsible_creates_only_transfer_requests() {
        assert!(ACCESS.can_create("Responsible", "TransferRequests"));
        assert!(!ACCESS.can_edit("Responsible", "TransferRequests"));
        assert!(!ACCESS.can_create("Responsible", "Maintenances"));
        assert!(ACCESS.can_export_reports("Responsible"));
    }

    #[test]
    fn test_validate_rejects_stray_read_only_entity() {
        let config = config_with(&["Users"], Capabilities::EDIT);
        assert!(matches!(
            config.validate(),
            Err(AccessError::InvalidRoleConfig { .. })
        ));
    }

    #[test]
    fn test_new_requires_fallback_config() {
        let result = AccessMatrix::new(vec![config_with(&[], Capabilities::EDIT)], Role::Employee);
        assert!(result.is_err());
    }
}
