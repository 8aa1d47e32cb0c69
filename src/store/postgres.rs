use axum::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Document, DocumentStore};
use crate::err::Error;

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS documents (
        id UUID PRIMARY KEY,
        collection TEXT NOT NULL,
        body JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents (collection, created_at)",
];

pub struct PostgresStore {
    pg: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, Error> {
        let pg = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(Error::from)?;
        Ok(Self { pg })
    }

    pub fn from_pool(pg: PgPool) -> Self {
        Self { pg }
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pg)
                .await
                .map_err(Error::from)?;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, Error> {
        let docs = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE collection = $1 ORDER BY created_at, id",
        )
        .bind(collection)
        .fetch_all(&self.pg)
        .await
        .map_err(Error::from)?;
        Ok(docs)
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, Error> {
        let doc = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE collection = $1 AND id = $2 LIMIT 1",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pg)
        .await
        .map_err(Error::from)?;
        Ok(doc)
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, Error> {
        let docs = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE collection = $1 AND body ->> $2 = $3 ORDER BY created_at, id",
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pg)
        .await
        .map_err(Error::from)?;
        Ok(docs)
    }

    async fn count(&self, collection: &str) -> Result<i64, Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_one(&self.pg)
            .await
            .map_err(Error::from)?;
        Ok(count)
    }

    async fn insert(&self, collection: &str, body: Value) -> Result<Document, Error> {
        let doc = Document::new(collection, body);
        let res = sqlx::query("INSERT INTO documents VALUES ($1, $2, $3, $4)")
            .bind(doc.id)
            .bind(&doc.collection)
            .bind(&doc.body)
            .bind(doc.created_at)
            .execute(&self.pg)
            .await
            .map_err(Error::from)?;

        if res.rows_affected() < 1 {
            return Err(Error::internal(
                "DatabaseError",
                "Could not save data to database!",
            ));
        }
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        body: Value,
    ) -> Result<Option<Document>, Error> {
        let doc = sqlx::query_as::<_, Document>(
            "UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2 RETURNING *",
        )
        .bind(collection)
        .bind(id)
        .bind(sqlx::types::Json(body))
        .fetch_optional(&self.pg)
        .await
        .map_err(Error::from)?;
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, Error> {
        let affected = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pg)
            .await
            .map_err(Error::from)?;
        Ok(affected.rows_affected() >= 1)
    }
}
