//! Entity name → service lookup.

use crate::{EntityService, StorageError, StorageResult};
use gestek_core::EntityName;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<EntityName, Arc<dyn EntityService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its own entity name, replacing any previous
    /// service for that entity.
    pub fn register(&mut self, service: Arc<dyn EntityService>) {
        self.services.insert(service.entity().clone(), service);
    }

    pub fn with(mut self, service: Arc<dyn EntityService>) -> Self {
        self.register(service);
        self
    }

    pub fn get(&self, entity: &str) -> Option<Arc<dyn EntityService>> {
        self.services.get(entity).cloned()
    }

    pub fn require(&self, entity: &str) -> StorageResult<Arc<dyn EntityService>> {
        self.get(entity).ok_or_else(|| StorageError::UnknownService {
            entity: entity.to_string(),
        })
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.services.contains_key(entity)
    }

    pub fn names(&self) -> impl Iterator<Item = &EntityName> {
        self.services.keys()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("entities", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}
