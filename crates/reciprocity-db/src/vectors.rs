//! pgvector-backed implementation of [`VectorIndex`].

use std::collections::HashMap;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::{trace, warn};

use reciprocity_core::{Error, Neighbor, Result, VectorIndex, VectorKind};

/// PostgreSQL implementation of VectorIndex over the `profile_vector` table.
#[derive(Clone)]
pub struct PgVectorIndex {
    pool: Pool<Postgres>,
    model: Option<String>,
}

impl PgVectorIndex {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool, model: None }
    }

    /// Record the embedding model name alongside stored vectors.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn store_vector(&self, user_id: &str, kind: VectorKind, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::InvalidInput(format!(
                "empty {} vector for {}",
                kind, user_id
            )));
        }
        sqlx::query(
            "INSERT INTO profile_vector (user_id, kind, vector, model, created_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (user_id, kind)
             DO UPDATE SET vector = EXCLUDED.vector,
                           model = EXCLUDED.model,
                           created_at = EXCLUDED.created_at",
        )
        .bind(user_id)
        .bind(kind.to_string())
        .bind(Vector::from(vector))
        .bind(self.model.as_deref())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn nearest(
        &self,
        vector: &[f32],
        kind: VectorKind,
        threshold: f32,
        exclude: &str,
    ) -> Result<Vec<Neighbor>> {
        if vector.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = Vector::from(vector.to_vec());

        // Rows with a different dimension are skipped rather than erroring.
        let rows = sqlx::query(
            "SELECT user_id, score FROM (
                 SELECT user_id, 1.0 - (vector <=> $1::vector) AS score
                 FROM profile_vector
                 WHERE kind = $2
                   AND user_id <> $3
                   AND vector_dims(vector) = vector_dims($1::vector)
             ) sub
             WHERE score >= $4
             ORDER BY score DESC, user_id",
        )
        .bind(&query_vec)
        .bind(kind.to_string())
        .bind(exclude)
        .bind(threshold as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let neighbors: Vec<Neighbor> = rows
            .into_iter()
            .map(|row| Neighbor {
                user_id: row.get("user_id"),
                score: row.get::<f64, _>("score") as f32,
            })
            .filter(|n| n.score.is_finite())
            .collect();

        trace!(
            subsystem = "db",
            component = "vector_index",
            op = "nearest",
            kind = %kind,
            threshold,
            result_count = neighbors.len(),
            "Nearest-neighbour query"
        );
        Ok(neighbors)
    }

    async fn get_vectors(&self, user_id: &str) -> Result<HashMap<VectorKind, Vec<f32>>> {
        let rows = sqlx::query("SELECT kind, vector FROM profile_vector WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut vectors = HashMap::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("kind");
            match raw.parse::<VectorKind>() {
                Ok(kind) => {
                    let vector: Vector = row.get("vector");
                    vectors.insert(kind, vector.to_vec());
                }
                Err(e) => warn!(
                    subsystem = "db",
                    component = "vector_index",
                    user_id,
                    kind = %raw,
                    error = %e,
                    "Skipping vector with unknown kind"
                ),
            }
        }
        Ok(vectors)
    }

    async fn retain_kinds(&self, user_id: &str, keep: &[VectorKind]) -> Result<u64> {
        let keep: Vec<String> = keep.iter().map(|k| k.to_string()).collect();
        let result = sqlx::query(
            "DELETE FROM profile_vector WHERE user_id = $1 AND NOT (kind = ANY($2))",
        )
        .bind(user_id)
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
