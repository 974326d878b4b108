//! GesTecK Storage - Entity Service Trait and In-Memory Implementation
//!
//! Defines the per-entity backend abstraction the dashboard talks to. The
//! HTTP client for the real backend lives outside this workspace.

pub mod error;
pub mod memory;
pub mod registry;
pub mod service;

pub use error::{StorageError, StorageResult};
pub use memory::{evaluate, InMemoryEntityService, ServiceOp};
pub use registry::ServiceRegistry;
pub use service::EntityService;
