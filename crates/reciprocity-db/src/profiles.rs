//! Profile repository over the `match_profile` table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};

use reciprocity_core::{
    ClassifiedIntent, Dimension, Error, MatchIntent, PendingReason, PendingUser, Profile,
    ProfileRepository, Result, UserId,
};

const PROFILE_COLUMNS: &str = "user_id, designation, requirements_text, offerings_text,
    requirement_dimensions, offering_dimensions, intent, intent_confidence,
    dealbreakers, last_updated_at, created_at";

/// PostgreSQL implementation of ProfileRepository.
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: Pool<Postgres>,
}

impl PgProfileRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert or update a profile. Used by onboarding and fixtures.
    pub async fn upsert(&self, profile: &Profile) -> Result<()> {
        let (intent, confidence) = match profile.intent {
            Some(c) => (Some(c.intent.as_str()), Some(c.confidence)),
            None => (None, None),
        };
        let dealbreakers: Vec<String> = profile.dealbreakers.iter().cloned().collect();

        sqlx::query(
            "INSERT INTO match_profile (user_id, designation, requirements_text, offerings_text,
                 requirement_dimensions, offering_dimensions, intent, intent_confidence,
                 dealbreakers, last_updated_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (user_id) DO UPDATE SET
                 designation = EXCLUDED.designation,
                 requirements_text = EXCLUDED.requirements_text,
                 offerings_text = EXCLUDED.offerings_text,
                 requirement_dimensions = EXCLUDED.requirement_dimensions,
                 offering_dimensions = EXCLUDED.offering_dimensions,
                 intent = EXCLUDED.intent,
                 intent_confidence = EXCLUDED.intent_confidence,
                 dealbreakers = EXCLUDED.dealbreakers,
                 last_updated_at = EXCLUDED.last_updated_at",
        )
        .bind(&profile.user_id)
        .bind(profile.designation.as_deref())
        .bind(&profile.requirements_text)
        .bind(&profile.offerings_text)
        .bind(serde_json::to_value(&profile.requirement_dimensions)?)
        .bind(serde_json::to_value(&profile.offering_dimensions)?)
        .bind(intent)
        .bind(confidence)
        .bind(&dealbreakers)
        .bind(profile.last_updated_at)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Set the "needs matching" flag. A pending `profile_changed` reason is
    /// never downgraded to `pending`.
    pub async fn flag_needs_matching(&self, user_id: &str, reason: PendingReason) -> Result<()> {
        let result = sqlx::query(
            "UPDATE match_profile
             SET needs_matching = TRUE,
                 pending_reason = CASE
                     WHEN needs_matching AND pending_reason = 'profile_changed' THEN 'profile_changed'
                     ELSE $2
                 END,
                 flagged_at = COALESCE(flagged_at, now()),
                 flag_version = flag_version + 1
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ProfileNotFound(user_id.to_string()));
        }
        Ok(())
    }

    fn map_row(row: &PgRow) -> Result<Profile> {
        let intent = match row.get::<Option<String>, _>("intent") {
            Some(raw) => match raw.parse::<MatchIntent>() {
                Ok(intent) => Some(ClassifiedIntent {
                    intent,
                    confidence: row.get::<Option<f32>, _>("intent_confidence").unwrap_or(0.5),
                }),
                Err(e) => {
                    warn!(subsystem = "db", component = "profiles", error = %e, "Ignoring cached intent");
                    None
                }
            },
            None => None,
        };

        let requirement_dimensions: BTreeMap<Dimension, String> =
            serde_json::from_value(row.get("requirement_dimensions"))?;
        let offering_dimensions: BTreeMap<Dimension, String> =
            serde_json::from_value(row.get("offering_dimensions"))?;
        let dealbreakers: Vec<String> = row.get("dealbreakers");
        let last_updated_at: DateTime<Utc> = row.get("last_updated_at");
        let created_at: DateTime<Utc> = row.get("created_at");

        Ok(Profile {
            user_id: row.get("user_id"),
            designation: row.get("designation"),
            requirements_text: row.get("requirements_text"),
            offerings_text: row.get("offerings_text"),
            requirement_dimensions,
            offering_dimensions,
            intent,
            dealbreakers: dealbreakers.into_iter().collect(),
            last_updated_at,
            created_at,
        })
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn get(&self, user_id: &str) -> Result<Option<Profile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM match_profile WHERE user_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_many(&self, user_ids: &[UserId]) -> Result<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM match_profile WHERE user_id = ANY($1) ORDER BY user_id",
            PROFILE_COLUMNS
        ))
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<PendingUser>> {
        let rows = sqlx::query(
            "SELECT user_id, pending_reason, flag_version FROM match_profile
             WHERE needs_matching
             ORDER BY flagged_at NULLS FIRST, user_id
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let pending: Vec<PendingUser> = rows
            .into_iter()
            .map(|row| {
                let reason = row
                    .get::<Option<String>, _>("pending_reason")
                    .and_then(|r| r.parse::<PendingReason>().ok())
                    .unwrap_or(PendingReason::Pending);
                PendingUser::new(row.get::<String, _>("user_id"), reason)
                    .with_flag_version(row.get("flag_version"))
            })
            .collect();

        debug!(
            subsystem = "db",
            component = "profiles",
            op = "list_pending",
            result_count = pending.len(),
            "Listed users needing matching"
        );
        Ok(pending)
    }

    async fn clear_needs_matching(&self, users: &[PendingUser]) -> Result<u64> {
        if users.is_empty() {
            return Ok(0);
        }
        let user_ids: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
        let versions: Vec<i64> = users.iter().map(|u| u.flag_version).collect();
        let result = sqlx::query(
            "UPDATE match_profile p
             SET needs_matching = FALSE, pending_reason = NULL, flagged_at = NULL
             FROM UNNEST($1::text[], $2::bigint[]) AS listed(user_id, flag_version)
             WHERE p.user_id = listed.user_id
               AND p.flag_version = listed.flag_version
               AND p.needs_matching",
        )
        .bind(user_ids)
        .bind(versions)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
