//! Match documents over the `match_entry` table.
//!
//! A document is the set of rows sharing an `owner_id`; each row lives in one
//! of the two lists. The `(owner_id, list, matched_user_id)` primary key makes
//! `AppendIfAbsent` a plain `ON CONFLICT DO NOTHING`, so concurrent reciprocal
//! writers can never create duplicates.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, Row};
use tracing::{debug, warn};

use reciprocity_core::{
    Error, MatchDocument, MatchList, MatchStore, MatchType, Result, StoredMatchEntry, UpsertMode,
};

/// PostgreSQL implementation of MatchStore.
#[derive(Clone)]
pub struct PgMatchStore {
    pool: Pool<Postgres>,
}

impl PgMatchStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn insert_entries(
        conn: &mut PgConnection,
        owner: &str,
        list: MatchList,
        entries: &[StoredMatchEntry],
    ) -> Result<usize> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut written = 0usize;
        for entry in entries {
            if !seen.insert(entry.matched_user_id.as_str()) {
                continue;
            }
            let result = sqlx::query(
                "INSERT INTO match_entry
                     (owner_id, list, matched_user_id, similarity_score, match_type, explanation, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (owner_id, list, matched_user_id) DO NOTHING",
            )
            .bind(owner)
            .bind(list.as_str())
            .bind(&entry.matched_user_id)
            .bind(entry.similarity_score)
            .bind(entry.match_type.as_str())
            .bind(&entry.explanation)
            .bind(entry.created_at)
            .execute(&mut *conn)
            .await
            .map_err(Error::Database)?;
            written += result.rows_affected() as usize;
        }
        Ok(written)
    }

    async fn delete_list(conn: &mut PgConnection, owner: &str, list: MatchList) -> Result<u64> {
        let result = sqlx::query("DELETE FROM match_entry WHERE owner_id = $1 AND list = $2")
            .bind(owner)
            .bind(list.as_str())
            .execute(&mut *conn)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn get(&self, owner: &str) -> Result<MatchDocument> {
        let rows = sqlx::query(
            "SELECT list, matched_user_id, similarity_score, match_type, explanation, created_at
             FROM match_entry
             WHERE owner_id = $1
             ORDER BY seq",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut document = MatchDocument::empty(owner);
        for row in rows {
            let raw_list: String = row.get("list");
            let raw_type: String = row.get("match_type");
            let (list, match_type) = match (
                raw_list.parse::<MatchList>(),
                raw_type.parse::<MatchType>(),
            ) {
                (Ok(list), Ok(match_type)) => (list, match_type),
                (list, match_type) => {
                    warn!(
                        subsystem = "db",
                        component = "match_store",
                        owner,
                        list_ok = list.is_ok(),
                        type_ok = match_type.is_ok(),
                        "Skipping unreadable match entry"
                    );
                    continue;
                }
            };
            let created_at: DateTime<Utc> = row.get("created_at");
            document.updated_at = Some(match document.updated_at {
                Some(latest) if latest >= created_at => latest,
                _ => created_at,
            });
            document.list_mut(list).push(StoredMatchEntry {
                matched_user_id: row.get("matched_user_id"),
                similarity_score: row.get("similarity_score"),
                match_type,
                explanation: row.get("explanation"),
                created_at,
            });
        }
        Ok(document)
    }

    async fn upsert(
        &self,
        owner: &str,
        list: MatchList,
        entries: Vec<StoredMatchEntry>,
        mode: UpsertMode,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if mode == UpsertMode::Replace {
            Self::delete_list(&mut tx, owner, list).await?;
        }
        let written = Self::insert_entries(&mut tx, owner, list, &entries).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "match_store",
            op = "upsert",
            owner,
            list = %list,
            mode = ?mode,
            requested = entries.len(),
            result_count = written,
            "Match list written"
        );
        Ok(written)
    }

    async fn replace_document(&self, document: &MatchDocument) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for list in [MatchList::Requirements, MatchList::Offerings] {
            Self::delete_list(&mut tx, &document.owner, list).await?;
            Self::insert_entries(&mut tx, &document.owner, list, document.list(list)).await?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn clear(&self, owner: &str) -> Result<()> {
        sqlx::query("DELETE FROM match_entry WHERE owner_id = $1")
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
