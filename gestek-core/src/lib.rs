//! GesTecK Core - Grid Types
//!
//! Data types shared by every GesTecK crate: identities, coded enums, the
//! schema registry, the role access matrix, the backend predicate format and
//! the materialized table model. No I/O happens here.

pub mod access;
pub mod config;
pub mod enums;
pub mod error;
pub mod identity;
pub mod naming;
pub mod predicate;
pub mod schema;
pub mod table;

pub use access::{AccessMatrix, Capabilities, EntityGrant, RoleConfig, ACCESS};
pub use config::{ColumnStrategy, GridConfig, VisualIdOrder};
pub use enums::{
    role_redirect_path, CodedEnum, DestinyType, EnumParseError, EnumSpec, EquipmentState,
    LocationType, MaintenanceType, Role, TransferRequestStatus,
};
pub use error::{
    AccessError, ConfigError, FetchError, FieldErrors, FilterError, GestekError, GestekResult,
    OperationError, SchemaError,
};
pub use identity::{EntityName, RawId, Record, Session, Timestamp};
pub use naming::{PRIMARY_KEY, VISUAL_ID};
pub use predicate::{Predicate, PredicateParseError, PredicateString};
pub use schema::{EntityDef, EntityMetadata, FieldDef, FieldKind, SchemaRegistry, SCHEMA};
pub use table::{Cell, ColumnSource, FkCell, Row, Table, TableSet};
