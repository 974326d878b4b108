//! Entity service trait.
//!
//! One service per entity collection. The grid treats it as an opaque
//! backend: it may scope `get` to the signed-in user, and it is the final
//! authority on which writes succeed.

use crate::StorageResult;
use ::async_trait::async_trait;
use gestek_core::{EntityName, PredicateString, RawId, Record};

#[async_trait]
pub trait EntityService: Send + Sync {
    /// Entity collection this service serves.
    fn entity(&self) -> &EntityName;

    /// Records visible to the current session.
    async fn get(&self) -> StorageResult<Vec<Record>>;

    /// Every record regardless of session scope; feeds FK dropdowns and
    /// foreign filter lookups.
    async fn get_all(&self) -> StorageResult<Vec<Record>> {
        self.get().await
    }

    /// Create a record; returns it as stored, including its new id.
    async fn create(&self, record: Record) -> StorageResult<Record>;

    async fn update(&self, id: &RawId, record: Record) -> StorageResult<Record>;

    async fn delete(&self, id: &RawId) -> StorageResult<()>;

    /// Records matching every predicate.
    async fn filter(&self, predicates: &[PredicateString]) -> StorageResult<Vec<Record>>;
}
