//! Structured logging schema and field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (user skipped, batch retried) |
//! | INFO  | Lifecycle events, run and phase completions |
//! | DEBUG | Decision points, per-user results, config choices |
//! | TRACE | Per-candidate scoring and exclusion |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "scoring", "db", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "enhanced", "multi_vector", "synchronizer", "orchestrator", "webhook"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "find_candidates", "upsert", "send_batch", "run_sweep"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// User being matched (the viewer) or written to.
pub const USER_ID: &str = "user_id";

/// Candidate user under evaluation.
pub const CANDIDATE_ID: &str = "candidate_id";

/// Counterpart user receiving a reciprocal update.
pub const TARGET_ID: &str = "target_id";

/// Notification batch identifier.
pub const BATCH_ID: &str = "batch_id";

/// Canonical pair key.
pub const PAIR_KEY: &str = "pair_key";

/// Run mode: "inline" or "scheduled".
pub const RUN_MODE: &str = "mode";

/// Sweep phase: "recompute", "reciprocal", "notify".
pub const PHASE: &str = "phase";

/// Matching algorithm in use.
pub const ALGORITHM: &str = "algorithm";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidates considered before filtering.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of pairs in a batch.
pub const PAIR_COUNT: &str = "pair_count";

/// Number of users in a run.
pub const USER_COUNT: &str = "user_count";

/// Forward (requirements → offerings) score.
pub const FORWARD_SCORE: &str = "forward";

/// Reverse (offerings → requirements) score.
pub const REVERSE_SCORE: &str = "reverse";

/// Final score after boosts.
pub const FINAL_SCORE: &str = "final_score";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Why a candidate was excluded.
/// Values: see [`EXCLUSION_DEALBREAKER`] and siblings.
pub const EXCLUSION: &str = "exclusion";

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

// ─── Exclusion labels ──────────────────────────────────────────────────────

/// Candidate text hit one of the viewer's dealbreakers.
pub const EXCLUSION_DEALBREAKER: &str = "dealbreaker";

/// Both sides seek the same non-complementary thing.
pub const EXCLUSION_SAME_OBJECTIVE: &str = "same_objective";

/// Score did not clear the acceptance threshold or minimum tier.
pub const EXCLUSION_BELOW_THRESHOLD: &str = "below_threshold";

/// A required dimension fell at or below the floor.
pub const EXCLUSION_REQUIRED_DIMENSION: &str = "required_dimension";
