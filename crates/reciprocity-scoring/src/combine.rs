//! Score combination: cosine similarity, weighted multi-dimension sums,
//! tiering and bidirectional combination.
//!
//! All functions here are pure. Malformed input (zero-norm vectors,
//! mismatched dimensions, missing dimensions) degrades to a zero signal
//! rather than an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use reciprocity_core::defaults::REQUIRED_DIMENSION_FLOOR;
use reciprocity_core::{CandidateScore, Dimension, MatchTier, TierCutoffs, WeightTable};

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine(u: &[f32], v: &[f32]) -> f32 {
    if u.len() != v.len() || u.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut nu = 0.0f32;
    let mut nv = 0.0f32;
    for (a, b) in u.iter().zip(v.iter()) {
        dot += a * b;
        nu += a * a;
        nv += b * b;
    }
    if nu == 0.0 || nv == 0.0 {
        return 0.0;
    }
    let sim = dot / (nu.sqrt() * nv.sqrt());
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}

/// Result of [`weighted_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightedOutcome {
    /// All required dimensions cleared the floor.
    Eligible {
        total: f32,
        breakdown: Vec<CandidateScore>,
    },
    /// A required dimension was at or below the floor. Never ranked.
    Ineligible { dimension: Dimension, similarity: f32 },
}

impl WeightedOutcome {
    pub fn total(&self) -> Option<f32> {
        match self {
            Self::Eligible { total, .. } => Some(*total),
            Self::Ineligible { .. } => None,
        }
    }
}

/// Weighted sum of per-dimension similarities.
///
/// Dimensions absent from `similarities` count as 0. Similarities are
/// clamped to `[0, 1]` before weighting.
pub fn weighted_score(
    similarities: &BTreeMap<Dimension, f32>,
    weights: &WeightTable,
) -> WeightedOutcome {
    let mut total = 0.0;
    let mut breakdown = Vec::with_capacity(weights.weights().len());

    for w in weights.weights() {
        let similarity = similarities
            .get(&w.dimension)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        if w.required && similarity <= REQUIRED_DIMENSION_FLOOR {
            return WeightedOutcome::Ineligible {
                dimension: w.dimension,
                similarity,
            };
        }

        let weighted_score = similarity * w.weight;
        total += weighted_score;
        breakdown.push(CandidateScore {
            dimension: w.dimension,
            similarity,
            weight: w.weight,
            weighted_score,
        });
    }

    WeightedOutcome::Eligible { total, breakdown }
}

/// Bucket a weighted score into a tier.
pub fn score_to_tier(score: f32, cutoffs: &TierCutoffs) -> MatchTier {
    if score >= cutoffs.perfect {
        MatchTier::Perfect
    } else if score >= cutoffs.strong {
        MatchTier::Strong
    } else if score >= cutoffs.worth_exploring {
        MatchTier::WorthExploring
    } else {
        MatchTier::Low
    }
}

/// Geometric mean of the forward and reverse scores.
///
/// Negative inputs are treated as 0, so a one-sided match collapses to 0.
pub fn bidirectional_combine(forward: f32, reverse: f32) -> f32 {
    (forward.max(0.0) * reverse.max(0.0)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reciprocity_core::DimensionWeight;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn cosine_identical_is_one() {
        assert!(approx(cosine(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0));
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert!(approx(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
    }

    #[test]
    fn cosine_zero_norm_and_mismatch_are_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
    }

    #[test]
    fn bidirectional_is_geometric_mean() {
        assert!(approx(bidirectional_combine(0.8, 0.5), 0.4f32.sqrt()));
        assert!(approx(bidirectional_combine(0.8, 0.5), 0.6325));
        for x in [0.0, 0.3, 1.0] {
            assert_eq!(bidirectional_combine(0.0, x), 0.0);
            assert_eq!(bidirectional_combine(x, 0.0), 0.0);
        }
        assert_eq!(bidirectional_combine(-0.5, 0.9), 0.0);
    }

    fn sims(values: [f32; 6]) -> BTreeMap<Dimension, f32> {
        Dimension::ALL.into_iter().zip(values).collect()
    }

    #[test]
    fn weighted_score_matches_hand_computation() {
        let weights = WeightTable::default();
        let outcome = weighted_score(&sims([0.9, 0.9, 0.8, 0.2, 0.5, 1.0]), &weights);
        let total = outcome.total().unwrap();
        assert!(approx(total, 0.745), "total was {}", total);
        assert_eq!(score_to_tier(total, &TierCutoffs::default()), MatchTier::Strong);
        match outcome {
            WeightedOutcome::Eligible { breakdown, .. } => {
                assert_eq!(breakdown.len(), 6);
                assert!(approx(breakdown[1].weighted_score, 0.225));
            }
            _ => panic!("expected eligible"),
        }
    }

    #[test]
    fn required_dimension_at_floor_excludes_even_perfect_total() {
        let weights = WeightTable::new(vec![
            DimensionWeight {
                dimension: Dimension::PrimaryGoal,
                weight: 0.01,
                required: true,
            },
            DimensionWeight {
                dimension: Dimension::Industry,
                weight: 0.99,
                required: false,
            },
        ])
        .unwrap();
        let mut s = BTreeMap::new();
        s.insert(Dimension::PrimaryGoal, 0.3);
        s.insert(Dimension::Industry, 1.0);
        assert_eq!(
            weighted_score(&s, &weights),
            WeightedOutcome::Ineligible {
                dimension: Dimension::PrimaryGoal,
                similarity: 0.3
            }
        );
    }

    #[test]
    fn missing_dimension_counts_as_zero() {
        let weights = WeightTable::default();
        let mut s = BTreeMap::new();
        s.insert(Dimension::PrimaryGoal, 1.0);
        let total = weighted_score(&s, &weights).total().unwrap();
        assert!(approx(total, 0.20));
    }

    #[test]
    fn missing_required_dimension_is_ineligible() {
        let weights = WeightTable::default();
        let mut s = BTreeMap::new();
        s.insert(Dimension::Industry, 1.0);
        assert!(weighted_score(&s, &weights).total().is_none());
    }

    #[test]
    fn tiers_respect_cutoffs() {
        let c = TierCutoffs::default();
        assert_eq!(score_to_tier(0.80, &c), MatchTier::Perfect);
        assert_eq!(score_to_tier(0.79, &c), MatchTier::Strong);
        assert_eq!(score_to_tier(0.65, &c), MatchTier::Strong);
        assert_eq!(score_to_tier(0.45, &c), MatchTier::WorthExploring);
        assert_eq!(score_to_tier(0.44, &c), MatchTier::Low);
    }
}
