//! Enum types for grid entities
//!
//! Every domain enum carries one label/code table. The table is the only place
//! a variant's display label and backend integer code are written down; both
//! directions of the mapping are derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CODED ENUM SUPPORT
// ============================================================================

/// Ordered label/code table describing one enum field.
///
/// Entry order is display order, not priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: &'static str,
    pub entries: &'static [(&'static str, i64)],
}

impl EnumSpec {
    /// Labels in display order.
    pub fn values(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }

    pub fn code_of(&self, label: &str) -> Option<i64> {
        let wanted = normalize_token(label);
        self.entries
            .iter()
            .find(|(l, _)| normalize_token(l) == wanted)
            .map(|(_, code)| *code)
    }

    pub fn label_of(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(label, _)| *label)
    }

    /// Canonical label for a user-supplied label, if valid.
    pub fn canonical(&self, label: &str) -> Option<&'static str> {
        let wanted = normalize_token(label);
        self.entries
            .iter()
            .find(|(l, _)| normalize_token(l) == wanted)
            .map(|(l, _)| *l)
    }
}

/// A closed enum with a bidirectional label/code mapping.
pub trait CodedEnum: Sized + Copy + PartialEq + 'static {
    const SPEC: EnumSpec;
    const ALL: &'static [Self];

    fn position(&self) -> usize {
        Self::ALL.iter().position(|v| v == self).unwrap_or(0)
    }

    fn label(&self) -> &'static str {
        Self::SPEC.entries[self.position()].0
    }

    fn code(&self) -> i64 {
        Self::SPEC.entries[self.position()].1
    }

    fn from_code(code: i64) -> Option<Self> {
        Self::SPEC
            .entries
            .iter()
            .position(|(_, c)| *c == code)
            .map(|i| Self::ALL[i])
    }

    fn from_label(label: &str) -> Option<Self> {
        let wanted = normalize_token(label);
        Self::SPEC
            .entries
            .iter()
            .position(|(l, _)| normalize_token(l) == wanted)
            .map(|i| Self::ALL[i])
    }
}

/// Error when parsing an invalid enum label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub enum_name: &'static str,
    pub input: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.enum_name, self.input)
    }
}

impl std::error::Error for EnumParseError {}

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => ($label:literal, $code:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl CodedEnum for $name {
            const SPEC: EnumSpec = EnumSpec {
                name: stringify!($name),
                entries: &[ $( ($label, $code) ),+ ],
            };
            const ALL: &'static [Self] = &[ $( $name::$variant ),+ ];
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$name as CodedEnum>::from_label(s).ok_or_else(|| EnumParseError {
                    enum_name: stringify!($name),
                    input: s.to_string(),
                })
            }
        }
    };
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ============================================================================
// DOMAIN ENUMS
// ============================================================================

coded_enum! {
    /// Lifecycle state of a piece of equipment.
    EquipmentState {
        Operative => ("Operative", 0),
        UnderMaintenance => ("UnderMaintenance", 1),
        Decommissioned => ("Decommissioned", 2),
        Disposed => ("Disposed", 3),
    }
}

coded_enum! {
    /// Where a piece of equipment physically sits.
    LocationType {
        Department => ("Department", 0),
        Warehouse => ("Warehouse", 1),
        Disposal => ("Disposal", 2),
    }
}

coded_enum! {
    /// Final destination of decommissioned equipment.
    DestinyType {
        Department => ("Department", 0),
        Warehouse => ("Warehouse", 1),
        Disposal => ("Disposal", 2),
    }
}

coded_enum! {
    MaintenanceType {
        Preventive => ("Preventive", 0),
        Corrective => ("Corrective", 1),
        Predictive => ("Predictive", 2),
    }
}

coded_enum! {
    /// Review status of a transfer request raised by a responsible.
    TransferRequestStatus {
        Pending => ("Pending", 0),
        Accepted => ("Accepted", 1),
        Rejected => ("Rejected", 2),
    }
}

// ============================================================================
// ROLES
// ============================================================================

/// Authenticated user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    Director,
    Responsible,
    Technical,
    Employee,
    /// Confirms reception and destination of decommissioned equipment.
    Receptor,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Administrator,
        Role::Director,
        Role::Responsible,
        Role::Technical,
        Role::Employee,
        Role::Receptor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Director => "Director",
            Role::Responsible => "Responsible",
            Role::Technical => "Technical",
            Role::Employee => "Employee",
            Role::Receptor => "Receptor",
        }
    }

    /// Dashboard route for the role.
    pub fn redirect_path(&self) -> &'static str {
        match self {
            Role::Administrator => "/admin",
            Role::Director => "/director",
            Role::Responsible => "/responsible",
            Role::Technical => "/technical",
            Role::Employee => "/employee",
            Role::Receptor => "/receptor",
        }
    }

    /// Entity collection holding the signed-in user's own row, used to
    /// auto-fill hidden self-reference fields.
    pub fn self_entity(&self) -> Option<&'static str> {
        match self {
            Role::Administrator => None,
            Role::Director => Some("Directors"),
            Role::Responsible => Some("Responsibles"),
            Role::Technical => Some("Technicals"),
            Role::Employee | Role::Receptor => Some("Employees"),
        }
    }
}

/// Route for an arbitrary role string; unknown roles go to `/`.
pub fn role_redirect_path(role: &str) -> &'static str {
    role.parse::<Role>()
        .map(|r| r.redirect_path())
        .unwrap_or("/")
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "director" => Ok(Role::Director),
            "responsible" => Ok(Role::Responsible),
            "technical" | "technician" => Ok(Role::Technical),
            "employee" => Ok(Role::Employee),
            "receptor" => Ok(Role::Receptor),
            _ => Err(EnumParseError {
                enum_name: "Role",
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_enum_label_and_code() {
        assert_eq!(EquipmentState::UnderMaintenance.label(), "UnderMaintenance");
        assert_eq!(EquipmentState::UnderMaintenance.code(), 1);
        assert_eq!(EquipmentState::from_code(3), Some(EquipmentState::Disposed));
        assert_eq!(EquipmentState::from_code(9), None);
    }

    #[test]
    fn test_coded_enum_from_str_normalizes() {
        assert_eq!("under_maintenance".parse(), Ok(EquipmentState::UnderMaintenance));
        assert_eq!("warehouse".parse(), Ok(LocationType::Warehouse));
        assert!("Basement".parse::<LocationType>().is_err());
    }

    #[test]
    fn test_enum_spec_preserves_display_order() {
        let values: Vec<_> = DestinyType::SPEC.values().collect();
        assert_eq!(values, vec!["Department", "Warehouse", "Disposal"]);
    }

    #[test]
    fn test_enum_spec_lookup_both_directions() {
        let spec = MaintenanceType::SPEC;
        assert_eq!(spec.code_of("corrective"), Some(1));
        assert_eq!(spec.label_of(2), Some("Predictive"));
        assert_eq!(spec.canonical("PREVENTIVE"), Some("Preventive"));
        assert_eq!(spec.code_of("Unknown"), None);
    }

    #[test]
    fn test_role_parse_and_redirect() {
        assert_eq!("Technical".parse(), Ok(Role::Technical));
        assert_eq!(role_redirect_path("Administrator"), "/admin");
        assert_eq!(role_redirect_path("Janitor"), "/");
    }

    #[test]
    fn test_role_self_entity() {
        assert_eq!(Role::Technical.self_entity(), Some("Technicals"));
        assert_eq!(Role::Administrator.self_entity(), None);
    }

    #[test]
    fn test_every_domain_enum_roundtrips_through_code() {
        for state in EquipmentState::ALL {
            assert_eq!(EquipmentState::from_code(state.code()), Some(*state));
        }
        for status in TransferRequestStatus::ALL {
            assert_eq!(TransferRequestStatus::from_label(status.label()), Some(*status));
        }
    }
}
