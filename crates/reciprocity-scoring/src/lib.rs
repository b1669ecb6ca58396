//! # reciprocity-scoring
//!
//! Scoring primitives and matching strategies.
//!
//! - [`combine`]: cosine, weighted multi-dimension score, tiers, bidirectional combine
//! - [`intent`]: keyword intent classification and compatibility
//! - [`hard_filter`]: dealbreaker and same-objective exclusion
//! - [`boost`]: activity decay and new-user ramp
//! - [`explanation`]: stored explanation text
//! - [`strategy`]: the [`MatchingAlgorithm`] trait and its three implementations

pub mod boost;
pub mod combine;
pub mod explanation;
pub mod hard_filter;
pub mod intent;
pub mod strategy;

pub use boost::{final_score, BoostCalculator};
pub use combine::{bidirectional_combine, cosine, score_to_tier, weighted_score, WeightedOutcome};
pub use hard_filter::{
    is_same_objective_blocked, violated_dealbreakers, ExclusionReason, ExclusionStats,
};
pub use intent::{classify, compatibility, intent_of, intent_quality};
pub use strategy::{
    build_algorithm, CandidateSet, EnhancedMatcher, MatchingAlgorithm, MultiVectorMatcher,
    SimpleMatcher,
};
