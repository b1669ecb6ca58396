//! Centralized default constants for the reciprocity matching engine.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration loaders fall back to these constants when an environment
//! variable is missing or unparseable.
//!
//! Organized by domain area.

// =============================================================================
// DIMENSION WEIGHTS
// =============================================================================

/// Weight of the primary-goal dimension.
pub const WEIGHT_PRIMARY_GOAL: f32 = 0.20;

/// Weight of the industry dimension.
pub const WEIGHT_INDUSTRY: f32 = 0.25;

/// Weight of the stage dimension.
pub const WEIGHT_STAGE: f32 = 0.20;

/// Weight of the geography dimension.
pub const WEIGHT_GEOGRAPHY: f32 = 0.15;

/// Weight of the engagement-style dimension.
pub const WEIGHT_ENGAGEMENT_STYLE: f32 = 0.10;

/// Weight of the dealbreakers dimension.
pub const WEIGHT_DEALBREAKERS: f32 = 0.10;

/// A required dimension at or below this similarity makes the candidate ineligible.
pub const REQUIRED_DIMENSION_FLOOR: f32 = 0.3;

// =============================================================================
// TIERS
// =============================================================================

/// Minimum weighted score for the PERFECT tier.
pub const TIER_PERFECT: f32 = 0.80;

/// Minimum weighted score for the STRONG tier.
pub const TIER_STRONG: f32 = 0.65;

/// Minimum weighted score for the WORTH_EXPLORING tier.
pub const TIER_WORTH_EXPLORING: f32 = 0.45;

// =============================================================================
// MATCHING
// =============================================================================

/// Acceptance threshold for combined (enhanced) or single-direction (simple) scores.
pub const SIMILARITY_THRESHOLD: f32 = 0.5;

/// Candidate retrieval floor as a fraction of the acceptance threshold.
///
/// Candidates are fetched from the index at half the final threshold so that
/// pairs which only clear the bar after combination are not lost.
pub const CANDIDATE_FLOOR_RATIO: f32 = 0.5;

/// Per-viewer result limit.
pub const MATCH_LIMIT: usize = 50;

/// Maximum new pairs a single source user may create per cycle.
pub const MAX_MATCHES_PER_CYCLE: usize = 10;

/// Minimum stored score for a pair to be notified.
pub const NOTIFY_MIN_SCORE: f32 = 0.0;

// =============================================================================
// INTENT
// =============================================================================

/// Confidence assigned to the GENERAL fallback intent.
pub const INTENT_FALLBACK_CONFIDENCE: f32 = 0.5;

/// Upper bound on classifier confidence.
pub const INTENT_MAX_CONFIDENCE: f32 = 0.95;

/// Compatibility for intent pairs not listed in the compatibility table.
pub const INTENT_DEFAULT_COMPATIBILITY: f32 = 0.5;

// =============================================================================
// BOOSTS
// =============================================================================

/// Activity decay half-life in days.
pub const ACTIVITY_HALF_LIFE_DAYS: f32 = 30.0;

/// Lower clamp of the activity multiplier.
pub const ACTIVITY_BOOST_MIN: f32 = 0.5;

/// Upper clamp of the activity multiplier.
pub const ACTIVITY_BOOST_MAX: f32 = 1.5;

/// New-user ramp window in days.
pub const NEW_USER_BOOST_DAYS: f32 = 14.0;

/// Temporal multiplier on the day a profile is created.
pub const NEW_USER_BOOST_MAX: f32 = 1.3;

// =============================================================================
// SCHEDULED SWEEP
// =============================================================================

/// Interval between scheduled sweeps (4 hours).
pub const SWEEP_INTERVAL_SECS: u64 = 14_400;

/// Maximum users recomputed concurrently during phase 1.
pub const SWEEP_MAX_CONCURRENT: usize = 4;

/// Maximum flagged users picked up by one sweep.
pub const SWEEP_BATCH_SIZE: usize = 500;

/// Bound on every store/index call and on a single user's recompute.
pub const OPERATION_TIMEOUT_MS: u64 = 10_000;

/// Number of single-writer shards used for reciprocal updates.
pub const SYNC_WRITER_SHARDS: usize = 8;

/// Queue depth of each reciprocal writer shard.
pub const SYNC_WRITER_QUEUE_DEPTH: usize = 256;

// =============================================================================
// NOTIFICATION
// =============================================================================

/// Webhook request timeout in seconds.
pub const WEBHOOK_TIMEOUT_SECS: u64 = 30;

/// Path appended to the backend URL for match-ready notifications.
pub const WEBHOOK_MATCHES_READY_PATH: &str = "/webhooks/matches-ready";

/// Header carrying the webhook API key.
pub const WEBHOOK_API_KEY_HEADER: &str = "X-API-KEY";

/// Header carrying the HMAC-SHA256 body signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Reciprocity-Signature";

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum pool connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default minimum pool connections.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_weights_sum_to_one() {
        let sum = WEIGHT_PRIMARY_GOAL
            + WEIGHT_INDUSTRY
            + WEIGHT_STAGE
            + WEIGHT_GEOGRAPHY
            + WEIGHT_ENGAGEMENT_STYLE
            + WEIGHT_DEALBREAKERS;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tier_cutoffs_descending() {
        assert!(TIER_PERFECT > TIER_STRONG);
        assert!(TIER_STRONG > TIER_WORTH_EXPLORING);
        assert!(TIER_WORTH_EXPLORING > 0.0);
    }

    #[test]
    fn activity_bounds_ordered() {
        assert!(ACTIVITY_BOOST_MIN < ACTIVITY_BOOST_MAX);
    }

    #[test]
    fn candidate_floor_below_threshold() {
        assert!(SIMILARITY_THRESHOLD * CANDIDATE_FLOOR_RATIO < SIMILARITY_THRESHOLD);
    }
}
