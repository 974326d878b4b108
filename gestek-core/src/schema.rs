//! Schema Registry
//!
//! Static per-entity metadata: field type tags, required/readonly/hidden
//! flags, foreign-key targets and enum tables. Instead of scattering column
//! knowledge across forms and viewers, every entity is defined here once.

use crate::enums::{
    CodedEnum, DestinyType, EnumSpec, EquipmentState, LocationType, MaintenanceType,
    TransferRequestStatus,
};
use crate::naming::{self, PRIMARY_KEY, VISUAL_ID};
use crate::{EntityName, SchemaError};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

// ============================================================================
// FIELD DEFINITIONS
// ============================================================================

/// Type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    /// ISO-8601 date or date-time string.
    Date,
    Enum(EnumSpec),
    /// Reference to another registered entity by its raw id.
    ForeignKey(&'static str),
}

impl FieldKind {
    /// Columns that accept `>`, `<`, `>=`, `<=` filter prefixes.
    pub fn is_comparable(&self) -> bool {
        matches!(self, FieldKind::Number | FieldKind::Date)
    }
}

/// A single field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Server-managed; never sent on create/update.
    pub readonly: bool,
    /// Not rendered in headers or forms.
    pub hidden: bool,
    /// Number fields that must hold whole values.
    pub integer: bool,
}

impl FieldDef {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            readonly: false,
            hidden: false,
            integer: false,
        }
    }

    pub const fn id() -> Self {
        Self::new(PRIMARY_KEY, FieldKind::String).readonly().hidden()
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub const fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub const fn enumeration(name: &'static str, spec: EnumSpec) -> Self {
        Self::new(name, FieldKind::Enum(spec))
    }

    pub const fn foreign(name: &'static str, target: &'static str) -> Self {
        Self::new(name, FieldKind::ForeignKey(target))
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub const fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    /// Referenced entity for foreign-key fields.
    pub fn reference(&self) -> Option<EntityName> {
        match self.kind {
            FieldKind::ForeignKey(target) => Some(EntityName::from(target)),
            _ => None,
        }
    }

    /// Ordered enum labels, if this is an enum field.
    pub fn enum_values(&self) -> Option<Vec<&'static str>> {
        match self.kind {
            FieldKind::Enum(spec) => Some(spec.values().collect()),
            _ => None,
        }
    }

    /// Label to backend code mapping, if this is an enum field.
    pub fn enum_code_map(&self) -> Option<BTreeMap<&'static str, i64>> {
        match self.kind {
            FieldKind::Enum(spec) => Some(spec.entries.iter().copied().collect()),
            _ => None,
        }
    }
}

/// Entity metadata: collection path and ordered field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDef {
    pub name: &'static str,
    /// Backend controller path (e.g. `/department`)
    pub api_path: &'static str,
    pub fields: &'static [FieldDef],
}

/// Alias matching the data-model name used throughout the grid.
pub type EntityMetadata = EntityDef;

impl EntityDef {
    pub fn entity_name(&self) -> EntityName {
        EntityName::from(self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Data fields in declaration order, primary key excluded.
    pub fn data_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !naming::is_primary_key(f.name))
    }

    /// Header list derived from the schema: `visualId` followed by every
    /// non-key, non-hidden field.
    pub fn default_columns(&self) -> Vec<String> {
        std::iter::once(VISUAL_ID.to_string())
            .chain(
                self.data_fields()
                    .filter(|f| !f.hidden)
                    .map(|f| f.name.to_string()),
            )
            .collect()
    }
}

// ============================================================================
// REGISTRY DEFINITIONS
// ============================================================================

const SECTIONS: &[FieldDef] = &[FieldDef::id(), FieldDef::string("Name").required()];

const DEPARTMENTS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("Name").required(),
    FieldDef::foreign("SectionId", "Sections").required(),
];

const EQUIPMENT_TYPES: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("Name").required(),
    FieldDef::number("EquipmentCount").integer().readonly(),
];

const EQUIPMENTS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("Name").required(),
    FieldDef::date("AcquisitionDate").required(),
    FieldDef::foreign("EquipmentTypeId", "EquipmentTypes").required(),
    FieldDef::foreign("DepartmentId", "Departments"),
    FieldDef::enumeration("StateId", EquipmentState::SPEC).required(),
    FieldDef::enumeration("LocationTypeId", LocationType::SPEC).required(),
];

const RESPONSIBLES: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("Name").required(),
    FieldDef::string("Email").required(),
    FieldDef::foreign("DepartmentId", "Departments").required(),
];

const DIRECTORS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("Name").required(),
    FieldDef::string("Email").required(),
];

const TECHNICALS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("Name").required(),
    FieldDef::string("Email").required(),
    FieldDef::string("Speciality"),
    FieldDef::number("Experience").integer(),
];

const EMPLOYEES: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("Name").required(),
    FieldDef::string("Email").required(),
    FieldDef::foreign("DepartmentId", "Departments").required(),
];

const ASSESSMENTS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::foreign("TechnicalId", "Technicals").required(),
    FieldDef::foreign("DirectorId", "Directors").required(),
    FieldDef::number("Score").integer().required(),
    FieldDef::string("Comment"),
    FieldDef::date("AssessmentDate").required(),
];

const MAINTENANCES: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::foreign("EquipmentId", "Equipments").required(),
    FieldDef::foreign("TechnicalId", "Technicals").required(),
    FieldDef::date("MaintenanceDate").required(),
    FieldDef::enumeration("MaintenanceTypeId", MaintenanceType::SPEC).required(),
    FieldDef::number("Cost").required(),
];

const TRANSFERS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::foreign("EquipmentId", "Equipments").required(),
    FieldDef::foreign("SourceDepartmentId", "Departments").required(),
    FieldDef::foreign("TargetDepartmentId", "Departments").required(),
    FieldDef::foreign("ResponsibleId", "Responsibles").required(),
    FieldDef::date("TransferDate").required(),
];

const TRANSFER_REQUESTS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::foreign("EquipmentId", "Equipments").required(),
    FieldDef::foreign("RequesterId", "Responsibles").required(),
    FieldDef::foreign("TargetDepartmentId", "Departments").required(),
    FieldDef::date("RequestDate").required(),
    FieldDef::enumeration("StatusId", TransferRequestStatus::SPEC).readonly(),
];

const EQUIPMENT_DECOMMISSIONS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::foreign("EquipmentId", "Equipments").required(),
    FieldDef::foreign("TechnicalId", "Technicals").required(),
    FieldDef::foreign("DepartmentId", "Departments"),
    FieldDef::foreign("RecipientId", "Employees"),
    FieldDef::enumeration("DestinyTypeId", DestinyType::SPEC).required(),
    FieldDef::date("DecommissionDate").required(),
    FieldDef::string("Reason").required(),
];

const USERS: &[FieldDef] = &[
    FieldDef::id(),
    FieldDef::string("UserName").required(),
    FieldDef::string("Email").required(),
    FieldDef::string("Role").readonly(),
];

const BUILTIN_ENTITIES: &[EntityDef] = &[
    EntityDef {
        name: "Sections",
        api_path: "/section",
        fields: SECTIONS,
    },
    EntityDef {
        name: "Departments",
        api_path: "/department",
        fields: DEPARTMENTS,
    },
    EntityDef {
        name: "EquipmentTypes",
        api_path: "/equipmenttype",
        fields: EQUIPMENT_TYPES,
    },
    EntityDef {
        name: "Equipments",
        api_path: "/equipment",
        fields: EQUIPMENTS,
    },
    EntityDef {
        name: "Responsibles",
        api_path: "/responsible",
        fields: RESPONSIBLES,
    },
    EntityDef {
        name: "Directors",
        api_path: "/director",
        fields: DIRECTORS,
    },
    EntityDef {
        name: "Technicals",
        api_path: "/technical",
        fields: TECHNICALS,
    },
    EntityDef {
        name: "Employees",
        api_path: "/employee",
        fields: EMPLOYEES,
    },
    EntityDef {
        name: "Assessments",
        api_path: "/assessment",
        fields: ASSESSMENTS,
    },
    EntityDef {
        name: "Maintenances",
        api_path: "/maintenance",
        fields: MAINTENANCES,
    },
    EntityDef {
        name: "Transfers",
        api_path: "/transfer",
        fields: TRANSFERS,
    },
    EntityDef {
        name: "TransferRequests",
        api_path: "/transferrequest",
        fields: TRANSFER_REQUESTS,
    },
    EntityDef {
        name: "EquipmentDecommissions",
        api_path: "/equipmentdecommission",
        fields: EQUIPMENT_DECOMMISSIONS,
    },
    EntityDef {
        name: "Users",
        api_path: "/user",
        fields: USERS,
    },
];

/// The global schema registry.
pub static SCHEMA: LazyLock<SchemaRegistry> = LazyLock::new(SchemaRegistry::builtin);

// ============================================================================
// REGISTRY IMPLEMENTATION
// ============================================================================

/// Central registry for entity metadata.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<&'static str, EntityDef>,
    order: Vec<&'static str>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in equipment-lifecycle entities.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for def in BUILTIN_ENTITIES {
            registry.register(*def);
        }
        registry
    }

    pub fn register(&mut self, def: EntityDef) {
        if self.entities.insert(def.name, def).is_none() {
            self.order.push(def.name);
        }
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Registered entity names in registration order.
    pub fn entity_names(&self) -> impl Iterator<Item = EntityName> + '_ {
        self.order.iter().map(|name| EntityName::from(*name))
    }

    /// Metadata for an entity.
    ///
    /// `UnknownEntity` is not fatal: callers render the entity generically.
    pub fn get_metadata(&self, entity: &str) -> Result<&EntityDef, SchemaError> {
        self.entities
            .get(entity)
            .ok_or_else(|| SchemaError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    pub fn field(&self, entity: &str, field: &str) -> Result<&FieldDef, SchemaError> {
        self.get_metadata(entity)?
            .field(field)
            .ok_or_else(|| SchemaError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            })
    }

    /// Type tag of a field, degrading to `String` for unknown entities/fields.
    pub fn field_kind(&self, entity: &str, field: &str) -> FieldKind {
        self.field(entity, field)
            .map(|f| f.kind)
            .unwrap_or(FieldKind::String)
    }

    /// Naming-convention guess restricted to registered entities.
    pub fn resolve_referenced_entity(&self, field: &str) -> Option<EntityName> {
        naming::referenced_entity_by_convention(field).filter(|e| self.contains(e.as_str()))
    }

    /// Entity referenced by `entity.field`.
    ///
    /// Explicit metadata wins: a declared foreign key uses its `ref`, a
    /// declared non-FK field is never a reference even if its name looks like
    /// one. Undeclared fields fall back to the naming convention.
    pub fn reference_for(&self, entity: &str, field: &str) -> Option<EntityName> {
        match self.field(entity, field) {
            Ok(def) => def.reference(),
            Err(_) => self.resolve_referenced_entity(field),
        }
    }

    pub fn is_foreign_key_field(&self, entity: &str, field: &str) -> bool {
        self.reference_for(entity, field).is_some()
    }

    /// Check the registry invariants: every FK targets a registered entity
    /// and every enum has at least one value.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for name in &self.order {
            let def = &self.entities[name];
            for field in def.fields {
                match field.kind {
                    FieldKind::ForeignKey(target) if !self.contains(target) => {
                        return Err(SchemaError::InvalidDefinition {
                            entity: def.name.to_string(),
                            field: field.name.to_string(),
                            reason: format!("references unregistered entity {target}"),
                        });
                    }
                    FieldKind::Enum(spec) if spec.entries.is_empty() => {
                        return Err(SchemaError::InvalidDefinition {
                            entity: def.name.to_string(),
                            field: field.name.to_string(),
                            reason: "enum has no values".to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_is_valid() {
        assert!(SCHEMA.validate().is_ok());
        assert_eq!(SCHEMA.entity_names().count(), BUILTIN_ENTITIES.len());
    }

    #[test]
    fn test_get_metadata_unknown_entity() {
        let err = SCHEMA.get_metadata("Widgets").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownEntity {
                entity: "Widgets".to_string()
            }
        );
    }

    #[test]
    fn test_field_kind_degrades_to_string() {
        assert_eq!(SCHEMA.field_kind("Widgets", "Anything"), FieldKind::String);
        assert_eq!(SCHEMA.field_kind("Equipments", "Missing"), FieldKind::String);
        assert_eq!(SCHEMA.field_kind("Maintenances", "Cost"), FieldKind::Number);
    }

    #[test]
    fn test_explicit_ref_wins_over_convention() {
        // Convention would guess "Requesters"; metadata says Responsibles.
        assert_eq!(
            SCHEMA.reference_for("TransferRequests", "RequesterId"),
            Some(EntityName::from("Responsibles"))
        );
        // Declared enum field named like an FK is not a reference.
        assert_eq!(SCHEMA.reference_for("Equipments", "StateId"), None);
        assert!(!SCHEMA.is_foreign_key_field("Equipments", "LocationTypeId"));
    }

    #[test]
    fn test_convention_fallback_for_undeclared_fields() {
        assert_eq!(
            SCHEMA.reference_for("Widgets", "DepartmentId"),
            Some(EntityName::from("Departments"))
        );
        // Convention target not registered.
        assert_eq!(SCHEMA.reference_for("Widgets", "GadgetId"), None);
        assert_eq!(SCHEMA.resolve_referenced_entity("GadgetId"), None);
    }

    #[test]
    fn test_default_columns_start_with_visual_id() {
        let cols = SCHEMA.get_metadata("Sections").unwrap().default_columns();
        assert_eq!(cols, vec!["visualId".to_string(), "Name".to_string()]);
    }

    #[test]
    fn test_enum_metadata_exposed() {
        let state = SCHEMA.field("Equipments", "StateId").unwrap();
        assert_eq!(
            state.enum_values().unwrap(),
            vec!["Operative", "UnderMaintenance", "Decommissioned", "Disposed"]
        );
        assert_eq!(state.enum_code_map().unwrap()["Disposed"], 3);
    }

    #[test]
    fn test_validate_rejects_dangling_reference() {
        const BROKEN: &[FieldDef] = &[FieldDef::id(), FieldDef::foreign("GadgetId", "Gadgets")];
        let mut registry = SchemaRegistry::new();
        registry.register(EntityDef {
            name: "Widgets",
            api_path: "/widget",
            fields: BROKEN,
        });
        assert!(matches!(
            registry.validate(),
            Err(SchemaError::InvalidDefinition { .. })
        ));
    }
}
