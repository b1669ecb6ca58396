//! Weighted per-dimension matching over the viewer's requirements side.
//!
//! Candidates are pooled from per-dimension nearest-neighbour queries, then
//! every configured dimension is scored with cosine against the candidate's
//! offerings vector of the same dimension. Results are tiered and filtered
//! by `min_tier`; a required dimension at or below the floor excludes the
//! candidate outright.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use reciprocity_core::logging;
use reciprocity_core::{
    AlgorithmKind, Direction, MatchList, MatchType, MatchingConfig, Profile, Result,
    ScoredCandidate, VectorIndex, VectorKind,
};

use super::{rank_order, CandidateSet, MatchingAlgorithm};
use crate::combine::{cosine, score_to_tier, weighted_score, WeightedOutcome};
use crate::explanation::multi_vector_explanation;
use crate::hard_filter::ExclusionReason;

pub struct MultiVectorMatcher {
    config: MatchingConfig,
    index: Arc<dyn VectorIndex>,
}

impl MultiVectorMatcher {
    pub fn new(config: MatchingConfig, index: Arc<dyn VectorIndex>) -> Self {
        Self { config, index }
    }
}

#[async_trait]
impl MatchingAlgorithm for MultiVectorMatcher {
    async fn find_candidates(&self, viewer: &Profile) -> Result<CandidateSet> {
        let viewer_vectors = self.index.get_vectors(&viewer.user_id).await?;
        let floor = self.config.candidate_floor();

        // Pool candidates from every dimension the viewer has a vector for.
        let mut pool: BTreeSet<String> = BTreeSet::new();
        for dimension in self.config.weights.dimensions() {
            let kind = VectorKind::dimension(Direction::Requirements, dimension);
            let Some(vector) = viewer_vectors.get(&kind) else {
                continue;
            };
            let neighbors = self
                .index
                .nearest(vector, kind.counterpart(), floor, &viewer.user_id)
                .await?;
            pool.extend(neighbors.into_iter().map(|n| n.user_id));
        }
        pool.remove(&viewer.user_id);

        let mut set = CandidateSet::default();
        for candidate_id in &pool {
            let candidate_vectors = self.index.get_vectors(candidate_id).await?;

            let similarities: BTreeMap<_, _> = self
                .config
                .weights
                .dimensions()
                .filter_map(|dimension| {
                    let ours = viewer_vectors
                        .get(&VectorKind::dimension(Direction::Requirements, dimension))?;
                    let theirs = candidate_vectors
                        .get(&VectorKind::dimension(Direction::Offerings, dimension))?;
                    Some((dimension, cosine(ours, theirs)))
                })
                .collect();

            match weighted_score(&similarities, &self.config.weights) {
                WeightedOutcome::Ineligible {
                    dimension,
                    similarity,
                } => {
                    set.exclusions.record(ExclusionReason::RequiredDimension);
                    trace!(
                        candidate_id = %candidate_id,
                        dimension = %dimension,
                        similarity,
                        exclusion = logging::EXCLUSION_REQUIRED_DIMENSION,
                        "Candidate ineligible"
                    );
                }
                WeightedOutcome::Eligible { total, breakdown } => {
                    let tier = score_to_tier(total, &self.config.tiers);
                    if tier < self.config.min_tier {
                        set.exclusions.record(ExclusionReason::BelowThreshold);
                        trace!(
                            candidate_id = %candidate_id,
                            total,
                            tier = %tier,
                            exclusion = logging::EXCLUSION_BELOW_THRESHOLD,
                            "Candidate below minimum tier"
                        );
                        continue;
                    }
                    set.candidates.push(ScoredCandidate {
                        user_id: candidate_id.clone(),
                        score: total,
                        list: MatchList::Requirements,
                        match_type: MatchType::MultiVector,
                        explanation: multi_vector_explanation(tier, &breakdown),
                        tier: Some(tier),
                        detail: None,
                    });
                }
            }
        }

        set.candidates.sort_by(rank_order);
        set.candidates.truncate(self.config.limit);

        debug!(
            subsystem = "scoring",
            component = "multi_vector",
            user_id = %viewer.user_id,
            candidate_count = pool.len(),
            result_count = set.candidates.len(),
            excluded = set.exclusions.total(),
            "Multi-vector matching complete"
        );
        Ok(set)
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::MultiVector
    }
}
