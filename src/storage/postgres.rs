//! PostgreSQL storage backend.
//!
//! Counters live in a `counters` table and are mutated with single
//! `INSERT .. ON CONFLICT DO UPDATE .. RETURNING` statements. Documents are
//! JSONB rows in a `documents` table whose partial unique index on
//! `(collection, unique_key)` backs the per-collection key uniqueness.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;

use crate::config::PostgresStorageConfig;
use crate::domain::{CounterState, Document};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{CounterStorage, DocumentStorage, Storage};

const SCHEMA: [&str; 3] = [
    r"
    CREATE TABLE IF NOT EXISTS counters (
        name        TEXT PRIMARY KEY,
        seq         BIGINT NOT NULL,
        version     BIGINT NOT NULL DEFAULT 0,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS documents (
        collection  TEXT NOT NULL,
        id          TEXT NOT NULL,
        unique_key  TEXT,
        body        JSONB NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS documents_collection_unique_key
        ON documents (collection, unique_key)
        WHERE unique_key IS NOT NULL
    ",
];

/// PostgreSQL-backed storage.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the schema cannot
    /// be created.
    pub async fn connect(config: &PostgresStorageConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    fn row_to_document(row: &PgRow) -> StorageResult<Document> {
        let id: String = row.try_get("id").map_err(map_sqlx_error)?;
        let key: Option<String> = row.try_get("unique_key").map_err(map_sqlx_error)?;
        let Json(body): Json<Value> = row.try_get("body").map_err(map_sqlx_error)?;
        Ok(Document { id, key, body })
    }
}

/// Map a sqlx error onto the storage taxonomy.
fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::DuplicateKey(db.message().to_string())
        }
        sqlx::Error::Io(e) => StorageError::Connection(e.to_string()),
        sqlx::Error::Tls(e) => StorageError::Connection(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StorageError::Unavailable,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::Serialization(err.to_string())
        }
        other => StorageError::Query(other.to_string()),
    }
}

#[async_trait]
impl CounterStorage for PostgresStorage {
    async fn increment(&self, name: &str) -> StorageResult<i64> {
        sqlx::query_scalar(
            r"
            INSERT INTO counters (name, seq, version, updated_at)
            VALUES ($1, 1, 1, now())
            ON CONFLICT (name) DO UPDATE
                SET seq = counters.seq + 1,
                    version = counters.version + 1,
                    updated_at = now()
            RETURNING seq
            ",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn raise_floor(&self, name: &str, seq: i64) -> StorageResult<i64> {
        sqlx::query_scalar(
            r"
            INSERT INTO counters (name, seq, version, updated_at)
            VALUES ($1, $2, 1, now())
            ON CONFLICT (name) DO UPDATE
                SET seq = GREATEST(counters.seq, EXCLUDED.seq),
                    version = counters.version + 1,
                    updated_at = now()
            RETURNING seq
            ",
        )
        .bind(name)
        .bind(seq)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn get_counter(&self, name: &str) -> StorageResult<Option<CounterState>> {
        let row = sqlx::query("SELECT name, seq, version, updated_at FROM counters WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| {
            let version: i64 = row.try_get("version").map_err(map_sqlx_error)?;
            let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_sqlx_error)?;
            Ok(CounterState {
                name: row.try_get("name").map_err(map_sqlx_error)?,
                seq: row.try_get("seq").map_err(map_sqlx_error)?,
                version: u64::try_from(version).unwrap_or_default(),
                updated_at: updated_at.timestamp_millis(),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl DocumentStorage for PostgresStorage {
    async fn insert(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, unique_key, body) VALUES ($1, $2, $3, $4)",
        )
        .bind(collection)
        .bind(&doc.id)
        .bind(doc.key.as_deref())
        .bind(Json(&doc.body))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, unique_key, body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn find_by_key(&self, collection: &str, key: &str) -> StorageResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, unique_key, body FROM documents WHERE collection = $1 AND unique_key = $2",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn list(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let rows = sqlx::query("SELECT id, unique_key, body FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(Self::row_to_document).collect()
    }

    async fn replace(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        let result = sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(&doc.id)
            .bind(Json(&doc.body))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "{collection}: document '{}' not found",
                doc.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, collection: &str) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn count(&self, collection: &str) -> StorageResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}
