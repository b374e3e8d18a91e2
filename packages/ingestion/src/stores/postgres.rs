//! Postgres-backed document store.
//!
//! Schema-flexible: every record lands in one JSONB table keyed by
//! (collection, id), and filters become `@>` containment queries. The
//! uniqueness guard for `insert_unique` is a transaction-scoped advisory
//! lock derived from the filter, so two workers racing past a dedup
//! check still converge on one document.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{DocumentFilter, DocumentRecord, DocumentStore, InsertOutcome};

fn connection(error: sqlx::Error) -> StoreError {
    StoreError::Connection(Box::new(error))
}

fn query_err(error: sqlx::Error) -> StoreError {
    StoreError::Query(Box::new(error))
}

/// Document store over a Postgres JSONB table.
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Connect and run migrations.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(connection)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id UUID NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_data
             ON documents USING gin (data jsonb_path_ops);",
        )
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn save<D: DocumentRecord>(&self, doc: &D) -> StoreResult<()> {
        let data = serde_json::to_value(doc)?;
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(D::COLLECTION)
        .bind(doc.id())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn find<D: DocumentRecord>(&self, filter: &DocumentFilter) -> StoreResult<Option<D>> {
        let row = sqlx::query(
            "SELECT data FROM documents
             WHERE collection = $1 AND data @> $2
             ORDER BY created_at LIMIT 1",
        )
        .bind(D::COLLECTION)
        .bind(filter.as_value())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(|row| {
            let data: Value = row.try_get("data").map_err(query_err)?;
            serde_json::from_value(data).map_err(StoreError::from)
        })
        .transpose()
    }

    async fn find_all<D: DocumentRecord>(&self, filter: &DocumentFilter) -> StoreResult<Vec<D>> {
        let rows = sqlx::query(
            "SELECT data FROM documents
             WHERE collection = $1 AND data @> $2
             ORDER BY created_at",
        )
        .bind(D::COLLECTION)
        .bind(filter.as_value())
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        rows.into_iter()
            .map(|row| {
                let data: Value = row.try_get("data").map_err(query_err)?;
                serde_json::from_value(data).map_err(StoreError::from)
            })
            .collect()
    }

    async fn insert_many<D: DocumentRecord>(&self, docs: &[D]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(connection)?;
        for doc in docs {
            let data = serde_json::to_value(doc)?;
            sqlx::query(
                "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
                 ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data",
            )
            .bind(D::COLLECTION)
            .bind(doc.id())
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }
        tx.commit().await.map_err(connection)?;
        Ok(docs.len())
    }

    async fn insert_unique<D: DocumentRecord>(
        &self,
        unique: &DocumentFilter,
        doc: &D,
    ) -> StoreResult<InsertOutcome<D>> {
        let mut tx = self.pool.begin().await.map_err(connection)?;

        // Serialize racing writers on the same key for the duration of
        // this transaction; released automatically at commit/rollback.
        let lock_key = format!(
            "{}:{}",
            D::COLLECTION,
            serde_json::to_string(&unique.as_value())?
        );
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&lock_key)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let existing = sqlx::query(
            "SELECT data FROM documents
             WHERE collection = $1 AND data @> $2
             ORDER BY created_at LIMIT 1",
        )
        .bind(D::COLLECTION)
        .bind(unique.as_value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_err)?;

        if let Some(row) = existing {
            let data: Value = row.try_get("data").map_err(query_err)?;
            tx.commit().await.map_err(connection)?;
            return Ok(InsertOutcome::Existing(serde_json::from_value(data)?));
        }

        let data = serde_json::to_value(doc)?;
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(D::COLLECTION)
            .bind(doc.id())
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        tx.commit().await.map_err(connection)?;

        Ok(InsertOutcome::Inserted(doc.clone()))
    }
}
