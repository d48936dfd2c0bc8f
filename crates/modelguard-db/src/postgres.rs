//! PostgreSQL implementation of ArtifactStore
//!
//! Artifacts are stored as JSONB records keyed by (partition, id). The `kind`
//! and `name` columns are copies of record fields kept for indexing.

use async_trait::async_trait;
use modelguard_core::{Artifact, ArtifactId, ArtifactKind};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::error::{DbError, DbResult};
use crate::repository::{ArtifactStore, Partition};

/// PostgreSQL implementation of ArtifactStore
#[derive(Debug, Clone)]
pub struct PostgresArtifactStore {
    pool: PgPool,
}

impl PostgresArtifactStore {
    /// Create a new PostgreSQL artifact store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_artifact(row: &PgRow) -> DbResult<Artifact> {
    let record: JsonValue = row.try_get("record")?;
    Ok(Artifact::from_record(record)?)
}

#[async_trait]
impl ArtifactStore for PostgresArtifactStore {
    #[instrument(skip(self), fields(artifact_id = %id, partition = %partition))]
    async fn get(&self, partition: Partition, id: &ArtifactId) -> DbResult<Option<Artifact>> {
        let row = sqlx::query("SELECT record FROM artifacts WHERE partition = $1 AND id = $2")
            .bind(partition.as_str())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_artifact).transpose()
    }

    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id(), partition = %partition))]
    async fn put(&self, partition: Partition, artifact: &Artifact) -> DbResult<()> {
        debug!("Upserting artifact record");

        // The conditional update leaves a row of another kind untouched, so a
        // zero row count means the kind would have changed.
        let result = sqlx::query(
            r#"
            INSERT INTO artifacts (id, partition, kind, name, record, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (partition, id) DO UPDATE
            SET name = EXCLUDED.name,
                record = EXCLUDED.record,
                updated_at = EXCLUDED.updated_at
            WHERE artifacts.kind = EXCLUDED.kind
            "#,
        )
        .bind(artifact.id().to_string())
        .bind(partition.as_str())
        .bind(artifact.kind().as_str())
        .bind(artifact.name())
        .bind(artifact.to_record()?)
        .bind(artifact.base().updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::InvalidData(format!(
                "Artifact {} already stored with a different kind than {}",
                artifact.id(),
                artifact.kind()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(artifact_id = %id, partition = %partition))]
    async fn delete(&self, partition: Partition, id: &ArtifactId) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM artifacts WHERE partition = $1 AND id = $2")
            .bind(partition.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self, partition: Partition) -> DbResult<Vec<Artifact>> {
        let rows = sqlx::query("SELECT record FROM artifacts WHERE partition = $1 ORDER BY id")
            .bind(partition.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_artifact).collect()
    }

    #[instrument(skip(self), fields(partition = %partition))]
    async fn query_by_field(
        &self,
        partition: Partition,
        kind: Option<ArtifactKind>,
        field: &str,
        value: &str,
    ) -> DbResult<Vec<Artifact>> {
        if field.is_empty() {
            return Err(DbError::InvalidQuery("Field name cannot be empty".to_string()));
        }

        let rows = sqlx::query(
            r#"
            SELECT record FROM artifacts
            WHERE partition = $1
              AND ($2::text IS NULL OR kind = $2)
              AND lower(record->>$3) = lower($4)
            ORDER BY id
            "#,
        )
        .bind(partition.as_str())
        .bind(kind.map(|k| k.as_str()))
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        debug!(matches = rows.len(), "Field query complete");
        rows.iter().map(row_to_artifact).collect()
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
