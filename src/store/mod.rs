use std::sync::Arc;

use axum::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::err::Error;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

pub type Store = Arc<dyn DocumentStore>;

/// A stored JSON body inside a named collection.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub collection: String,
    pub body: sqlx::types::Json<Value>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(collection: &str, body: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: collection.to_string(),
            body: sqlx::types::Json(body),
            created_at: Utc::now(),
        }
    }
}

/// Single-document operations over named collections. Every call is one
/// independent storage round trip.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// All documents of `collection`, oldest first.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, Error>;

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, Error>;

    /// Documents whose top-level `field` equals `value` as text.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, Error>;

    async fn count(&self, collection: &str) -> Result<i64, Error>;

    async fn insert(&self, collection: &str, body: Value) -> Result<Document, Error>;

    /// Replaces the body, keeping id and creation time. `None` if absent.
    async fn update(&self, collection: &str, id: Uuid, body: Value)
        -> Result<Option<Document>, Error>;

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, Error>;
}

/// Renders a JSON scalar the way Postgres `->>` does, so both backends
/// compare fields identically.
pub(crate) fn field_text(body: &Value, field: &str) -> Option<String> {
    match body.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
