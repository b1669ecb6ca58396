//! Notification ledger over the `notified_pair` table.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use reciprocity_core::{pair_key, Error, NotificationLedger, NotifiedPair, Result};

/// PostgreSQL implementation of NotificationLedger.
#[derive(Clone)]
pub struct PgNotificationLedger {
    pool: Pool<Postgres>,
}

impl PgNotificationLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> NotifiedPair {
        NotifiedPair {
            pair_key: row.get("pair_key"),
            user_a_id: row.get("user_a_id"),
            user_b_id: row.get("user_b_id"),
            notified_at: row.get("notified_at"),
            notification_count: row.get("notification_count"),
            last_similarity_score: row.get("last_similarity_score"),
        }
    }
}

fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[async_trait]
impl NotificationLedger for PgNotificationLedger {
    async fn mark_notified(&self, a: &str, b: &str, score: f32) -> Result<NotifiedPair> {
        if a == b {
            return Err(Error::InvalidInput(format!("cannot pair {} with itself", a)));
        }
        let (lo, hi) = ordered(a, b);
        let row = sqlx::query(
            "INSERT INTO notified_pair
                 (pair_key, user_a_id, user_b_id, notified_at, notification_count, last_similarity_score)
             VALUES ($1, $2, $3, now(), 1, $4)
             ON CONFLICT (pair_key) DO UPDATE SET
                 notified_at = now(),
                 notification_count = notified_pair.notification_count + 1,
                 last_similarity_score = EXCLUDED.last_similarity_score
             RETURNING pair_key, user_a_id, user_b_id, notified_at,
                       notification_count, last_similarity_score",
        )
        .bind(pair_key(a, b))
        .bind(lo)
        .bind(hi)
        .bind(score)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let pair = Self::map_row(row);
        debug!(
            subsystem = "db",
            component = "ledger",
            op = "mark_notified",
            pair_key = %pair.pair_key,
            notification_count = pair.notification_count,
            "Pair recorded as notified"
        );
        Ok(pair)
    }

    async fn get(&self, a: &str, b: &str) -> Result<Option<NotifiedPair>> {
        let row = sqlx::query(
            "SELECT pair_key, user_a_id, user_b_id, notified_at,
                    notification_count, last_similarity_score
             FROM notified_pair WHERE pair_key = $1",
        )
        .bind(pair_key(a, b))
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Self::map_row))
    }

    async fn clear(&self, user_id: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM notified_pair WHERE user_a_id = $1 OR user_b_id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
