//! In-memory entity service.
//!
//! Holds one collection in a `tokio` lock and evaluates backend predicate
//! strings itself. Supports a session scope (records returned by `get`) and
//! per-operation failure injection for exercising degraded paths.

use crate::{EntityService, StorageError, StorageResult};
use ::async_trait::async_trait;
use gestek_core::naming::{record_id, PRIMARY_KEY};
use gestek_core::table::value_text;
use gestek_core::{EntityName, Predicate, PredicateString, RawId, Record};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    Get,
    GetAll,
    Create,
    Update,
    Delete,
    Filter,
}

#[derive(Debug)]
pub struct InMemoryEntityService {
    entity: EntityName,
    records: RwLock<Vec<Record>>,
    /// Ids returned by `get`; `None` means every record.
    scope: RwLock<Option<BTreeSet<RawId>>>,
    failures: RwLock<HashMap<ServiceOp, StorageError>>,
}

impl InMemoryEntityService {
    pub fn new(entity: impl Into<EntityName>) -> Self {
        Self::with_records(entity, Vec::new())
    }

    pub fn with_records(entity: impl Into<EntityName>, records: Vec<Record>) -> Self {
        Self {
            entity: entity.into(),
            records: RwLock::new(records),
            scope: RwLock::new(None),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Restrict `get` to the given ids; `get_all` is unaffected.
    pub async fn set_scope(&self, ids: impl IntoIterator<Item = RawId>) {
        *self.scope.write().await = Some(ids.into_iter().collect());
    }

    pub async fn clear_scope(&self) {
        *self.scope.write().await = None;
    }

    /// Make every later `op` call fail with `error` until [`Self::recover`].
    pub async fn fail_on(&self, op: ServiceOp, error: StorageError) {
        self.failures.write().await.insert(op, error);
    }

    pub async fn recover(&self, op: ServiceOp) {
        self.failures.write().await.remove(&op);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }

    async fn check(&self, op: ServiceOp) -> StorageResult<()> {
        match self.failures.read().await.get(&op) {
            Some(error) => {
                debug!(entity = %self.entity, op = ?op, error = %error, "injected failure");
                Err(error.clone())
            }
            None => Ok(()),
        }
    }

    fn not_found(&self, id: &RawId) -> StorageError {
        StorageError::NotFound {
            entity: self.entity.clone(),
            id: id.clone(),
        }
    }

    async fn scoped(&self) -> Vec<Record> {
        let records = self.records.read().await;
        match self.scope.read().await.as_ref() {
            Some(ids) => records
                .iter()
                .filter(|r| record_id(r).is_some_and(|id| ids.contains(&id)))
                .cloned()
                .collect(),
            None => records.clone(),
        }
    }
}

/// Record value for a predicate field: `Department` matches a key
/// `Department` or `DepartmentId`, in any casing.
fn predicate_value<'r>(record: &'r Record, field: &str) -> Option<&'r Value> {
    let with_id = format!("{field}Id");
    record
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(field))
        .or_else(|| record.iter().find(|(k, _)| k.eq_ignore_ascii_case(&with_id)))
        .map(|(_, v)| v)
}

/// Evaluate one parsed predicate against a record.
pub fn evaluate(predicate: &Predicate, record: &Record) -> bool {
    let Some(value) = predicate_value(record, predicate.field()) else {
        return false;
    };
    match predicate {
        Predicate::Contains { literal, .. } => value_text(value)
            .to_lowercase()
            .contains(&literal.to_lowercase()),
        Predicate::Equals { id, .. } => RawId::from_value(value).is_some_and(|v| v.as_str() == id),
        Predicate::In { ids, .. } => {
            RawId::from_value(value).is_some_and(|v| ids.iter().any(|id| id == v.as_str()))
        }
    }
}

#[async_trait]
impl EntityService for InMemoryEntityService {
    fn entity(&self) -> &EntityName {
        &self.entity
    }

    async fn get(&self) -> StorageResult<Vec<Record>> {
        self.check(ServiceOp::Get).await?;
        let records = self.scoped().await;
        trace!(entity = %self.entity, count = records.len(), "get");
        Ok(records)
    }

    async fn get_all(&self) -> StorageResult<Vec<Record>> {
        self.check(ServiceOp::GetAll).await?;
        Ok(self.records.read().await.clone())
    }

    async fn create(&self, mut record: Record) -> StorageResult<Record> {
        self.check(ServiceOp::Create).await?;
        let mut records = self.records.write().await;
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = RawId::new(Uuid::now_v7().to_string());
                record.retain(|k, _| !k.eq_ignore_ascii_case(PRIMARY_KEY));
                record.insert(PRIMARY_KEY.to_string(), id.to_value());
                id
            }
        };
        if records.iter().any(|r| record_id(r).as_ref() == Some(&id)) {
            return Err(StorageError::Rejected {
                entity: self.entity.clone(),
                reason: format!("duplicate id {id}"),
            });
        }
        debug!(entity = %self.entity, id = %id, "created record");
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RawId, record: Record) -> StorageResult<Record> {
        self.check(ServiceOp::Update).await?;
        let mut records = self.records.write().await;
        let stored = records
            .iter_mut()
            .find(|r| record_id(r).as_ref() == Some(id))
            .ok_or_else(|| self.not_found(id))?;
        for (key, value) in record {
            if key.eq_ignore_ascii_case(PRIMARY_KEY) {
                continue;
            }
            // Keep the stored key spelling when the payload differs in case.
            let existing = stored.keys().find(|k| k.eq_ignore_ascii_case(&key)).cloned();
            stored.insert(existing.unwrap_or(key), value);
        }
        debug!(entity = %self.entity, id = %id, "updated record");
        Ok(stored.clone())
    }

    async fn delete(&self, id: &RawId) -> StorageResult<()> {
        self.check(ServiceOp::Delete).await?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| record_id(r).as_ref() != Some(id));
        if records.len() == before {
            return Err(self.not_found(id));
        }
        debug!(entity = %self.entity, id = %id, "deleted record");
        Ok(())
    }

    async fn filter(&self, predicates: &[PredicateString]) -> StorageResult<Vec<Record>> {
        self.check(ServiceOp::Filter).await?;
        let parsed = predicates
            .iter()
            .map(|p| p.parse())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StorageError::InvalidPredicate {
                entity: self.entity.clone(),
                source,
            })?;
        let matched: Vec<Record> = self
            .scoped()
            .await
            .into_iter()
            .filter(|record| parsed.iter().all(|p| evaluate(p, record)))
            .collect();
        debug!(
            entity = %self.entity,
            predicates = parsed.len(),
            matched = matched.len(),
            "filtered records"
        );
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn equipments() -> InMemoryEntityService {
        InMemoryEntityService::with_records(
            "Equipments",
            vec![
                record(json!({"Id": "e1", "Name": "MRI Scanner", "DepartmentId": "d1"})),
                record(json!({"Id": "e2", "Name": "X-Ray", "DepartmentId": "d2"})),
                record(json!({"Id": "e3", "Name": "CT Scanner", "DepartmentId": "d3"})),
            ],
        )
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| record_id(r).map(|id| id.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_filter_contains_and_membership() {
        let service = equipments();
        let contains = Predicate::contains("Name", "scanner").to_predicate_string();
        let result = service.filter(&[contains.clone()]).await.unwrap();
        assert_eq!(ids(&result), vec!["e1", "e3"]);

        let membership = Predicate::membership(
            "DepartmentId",
            &[RawId::new("d1"), RawId::new("d2")],
        )
        .unwrap()
        .to_predicate_string();
        let result = service.filter(&[contains, membership]).await.unwrap();
        assert_eq!(ids(&result), vec!["e1"]);
    }

    #[tokio::test]
    async fn test_filter_rejects_malformed_predicate() {
        let service = equipments();
        let bogus: PredicateString =
            serde_json::from_value(json!("Name LIKE 'x'")).unwrap();
        assert!(matches!(
            service.filter(&[bogus]).await,
            Err(StorageError::InvalidPredicate { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let service = InMemoryEntityService::new("Sections");
        let created = service.create(record(json!({"Name": "North"}))).await.unwrap();
        let id = record_id(&created).unwrap();
        assert!(!id.as_str().is_empty());
        assert_eq!(service.len().await, 1);

        let duplicate = service.create(created.clone()).await;
        assert!(matches!(duplicate, Err(StorageError::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_update_merges_and_delete_removes() {
        let service = equipments();
        let id = RawId::new("e2");
        let updated = service
            .update(&id, record(json!({"name": "X-Ray Mobile"})))
            .await
            .unwrap();
        assert_eq!(updated["Name"], json!("X-Ray Mobile"));
        assert_eq!(updated["DepartmentId"], json!("d2"));

        service.delete(&id).await.unwrap();
        assert!(matches!(
            service.delete(&id).await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            service.update(&id, Record::new()).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_scope_limits_get_but_not_get_all() {
        let service = equipments();
        service.set_scope([RawId::new("e3")]).await;
        assert_eq!(ids(&service.get().await.unwrap()), vec!["e3"]);
        assert_eq!(service.get_all().await.unwrap().len(), 3);
        service.clear_scope().await;
        assert_eq!(service.get().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let service = equipments();
        let error = StorageError::Unavailable {
            entity: EntityName::from("Equipments"),
            reason: "connection refused".to_string(),
        };
        service.fail_on(ServiceOp::Get, error.clone()).await;
        assert_eq!(service.get().await, Err(error));
        assert!(service.get_all().await.is_ok());
        service.recover(ServiceOp::Get).await;
        assert!(service.get().await.is_ok());
    }
}
