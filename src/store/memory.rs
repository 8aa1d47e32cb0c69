use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{field_text, Document, DocumentStore};
use crate::err::Error;

/// Process-local store for development and tests. Counts every call so
/// callers can check whether storage was touched at all.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    pub reads: AtomicU64,
    pub writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> u64 {
        self.reads.load(Ordering::Relaxed) + self.writes.load(Ordering::Relaxed)
    }

    pub fn mutations(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, Error> {
        self.read();
        let collections = self.collections.read().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, Error> {
        self.read();
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, Error> {
        self.read();
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| field_text(&doc.body, field).as_deref() == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<i64, Error> {
        self.read();
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |docs| docs.len() as i64))
    }

    async fn insert(&self, collection: &str, body: Value) -> Result<Document, Error> {
        self.write();
        let doc = Document::new(collection, body);
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        body: Value,
    ) -> Result<Option<Document>, Error> {
        self.write();
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id));
        Ok(doc.map(|doc| {
            doc.body = sqlx::types::Json(body);
            doc.clone()
        }))
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, Error> {
        self.write();
        let mut collections = self.collections.write().await;
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(false),
        };
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        Ok(docs.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn crud_cycle() {
        let store = MemoryStore::new();
        let doc = store.insert("subjects", json!({"name": "Maths"})).await.unwrap();
        assert_eq!(store.list("subjects").await.unwrap().len(), 1);

        let updated = store
            .update("subjects", doc.id, json!({"name": "Algebra"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, doc.id);
        assert_eq!(updated.created_at, doc.created_at);
        assert_eq!(updated.body.0["name"], "Algebra");

        assert!(store.delete("subjects", doc.id).await.unwrap());
        assert!(!store.delete("subjects", doc.id).await.unwrap());
        assert!(store.get("subjects", doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryStore::new();
        let doc = store.insert("students", json!({})).await.unwrap();
        assert!(store.get("teachers", doc.id).await.unwrap().is_none());
        assert!(store
            .update("teachers", doc.id, json!({}))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.count("teachers").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_by_field_compares_text() {
        let store = MemoryStore::new();
        let grade = Uuid::new_v4();
        store
            .insert("students", json!({"grade_id": grade, "level": 4}))
            .await
            .unwrap();
        store.insert("students", json!({"grade_id": null})).await.unwrap();
        let hits = store
            .find_by_field("students", "grade_id", &grade.to_string())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            store.find_by_field("students", "level", "4").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn counts_operations() {
        let store = MemoryStore::new();
        store.list("x").await.unwrap();
        store.insert("x", json!({})).await.unwrap();
        assert_eq!(store.operations(), 2);
        assert_eq!(store.mutations(), 1);
    }
}
