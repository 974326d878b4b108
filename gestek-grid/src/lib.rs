//! GesTecK Grid - Relational Data-Grid Engine
//!
//! Raw entity lists flow through the stages in order:
//! [`materialize`] → [`resolve`] (whole set) → role overlay → [`filter`] →
//! [`paginate`]. Every stage is synchronous and free of I/O; loading and
//! backend calls live in `gestek-dashboard`.

pub mod filter;
pub mod form;
pub mod materialize;
pub mod paginate;
pub mod resolve;
pub mod scalar;
pub mod view;

pub use filter::{
    build_server_predicate, matching_ids, CompiledFilter, FilterEngine, FilterKey, FilterSet,
    ForeignLookup, Pattern, ServerFilter, ServerPlan,
};
pub use form::{
    fk_options, form_fields, form_title, initial_values, prepare_payload, validate_form,
    FkOption, FormValues,
};
pub use materialize::Materializer;
pub use paginate::{clamp_page, paginate, total_pages, Page};
pub use resolve::{resolve_visual_ids, resolve_with, ResolutionContext, ResolutionSummary};
pub use view::{visible_tables, GridPage, GridView};
