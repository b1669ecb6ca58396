//! Bidirectional matching with hard filters, intent quality and boosts.
//!
//! Pipeline per viewer:
//!
//! 1. forward pool: viewer requirements vs. others' offerings
//! 2. reverse pool: viewer offerings vs. others' requirements
//! 3. intersect (both pools fetched at half the acceptance threshold)
//! 4. per candidate: hard filters, geometric-mean combine, threshold,
//!    intent quality, activity and new-user boosts
//! 5. rank by final score and limit
//!
//! A surviving candidate is placed in the requirements list when its forward
//! score clears the threshold and in the offerings list when its reverse
//! score does.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, trace};

use reciprocity_core::logging;
use reciprocity_core::{
    AlgorithmKind, BidirectionalMatch, Direction, MatchList, MatchType, MatchingConfig, Profile,
    ProfileRepository, Result, ScoredCandidate, UserId, VectorIndex, VectorKind,
};

use super::{rank_order, CandidateSet, MatchingAlgorithm};
use crate::boost::{final_score, BoostCalculator};
use crate::combine::bidirectional_combine;
use crate::explanation::{enhanced_gaps, enhanced_reasons};
use crate::hard_filter::{is_same_objective_blocked, violated_dealbreakers, ExclusionReason};
use crate::intent::{intent_of, intent_quality};

pub struct EnhancedMatcher {
    config: MatchingConfig,
    index: Arc<dyn VectorIndex>,
    profiles: Arc<dyn ProfileRepository>,
    boosts: BoostCalculator,
}

impl EnhancedMatcher {
    pub fn new(
        config: MatchingConfig,
        index: Arc<dyn VectorIndex>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        let boosts = BoostCalculator::from_config(&config);
        Self {
            config,
            index,
            profiles,
            boosts,
        }
    }

    async fn pool(
        &self,
        viewer: &Profile,
        vector: &[f32],
        direction: Direction,
    ) -> Result<HashMap<UserId, f32>> {
        let neighbors = self
            .index
            .nearest(
                vector,
                VectorKind::plain(direction.opposite()),
                self.config.candidate_floor(),
                &viewer.user_id,
            )
            .await?;
        Ok(neighbors
            .into_iter()
            .filter(|n| n.user_id != viewer.user_id)
            .map(|n| (n.user_id, n.score))
            .collect())
    }

    /// Hard filters, in both directions so a pair is excluded whichever side runs.
    fn hard_filter(&self, viewer: &Profile, candidate: &Profile) -> Option<ExclusionReason> {
        if self.config.enforce_dealbreakers {
            let viewer_text = viewer.combined_text();
            let candidate_text = candidate.combined_text();
            let ours = violated_dealbreakers(&viewer.dealbreakers, &candidate_text);
            let theirs = violated_dealbreakers(&candidate.dealbreakers, &viewer_text);
            if !ours.is_empty() || !theirs.is_empty() {
                trace!(
                    user_id = %viewer.user_id,
                    candidate_id = %candidate.user_id,
                    violated = ?ours.iter().chain(theirs.iter()).collect::<Vec<_>>(),
                    exclusion = logging::EXCLUSION_DEALBREAKER,
                    "Candidate ineligible"
                );
                return Some(ExclusionReason::Dealbreaker);
            }
        }
        if self.config.block_same_objective {
            let a = intent_of(viewer).intent;
            let b = intent_of(candidate).intent;
            if is_same_objective_blocked(a, b) {
                trace!(
                    user_id = %viewer.user_id,
                    candidate_id = %candidate.user_id,
                    intent = %a,
                    exclusion = logging::EXCLUSION_SAME_OBJECTIVE,
                    "Candidate ineligible"
                );
                return Some(ExclusionReason::SameObjective);
            }
        }
        None
    }
}

#[async_trait]
impl MatchingAlgorithm for EnhancedMatcher {
    async fn find_candidates(&self, viewer: &Profile) -> Result<CandidateSet> {
        let mut set = CandidateSet::default();
        let vectors = self.index.get_vectors(&viewer.user_id).await?;
        let (Some(req), Some(off)) = (
            vectors.get(&VectorKind::plain(Direction::Requirements)),
            vectors.get(&VectorKind::plain(Direction::Offerings)),
        ) else {
            debug!(
                subsystem = "scoring",
                component = "enhanced",
                user_id = %viewer.user_id,
                "Viewer has no vectors yet, no candidates"
            );
            return Ok(set);
        };

        let forward = self.pool(viewer, req, Direction::Requirements).await?;
        let reverse = self.pool(viewer, off, Direction::Offerings).await?;

        let mut both: Vec<UserId> = forward
            .keys()
            .filter(|id| reverse.contains_key(*id))
            .cloned()
            .collect();
        both.sort();

        let candidates = self.profiles.get_many(&both).await?;
        let threshold = self.config.similarity_threshold;
        let viewer_intent = intent_of(viewer);
        let now = Utc::now();

        let mut matches: Vec<BidirectionalMatch> = Vec::new();
        for candidate in &candidates {
            if let Some(reason) = self.hard_filter(viewer, candidate) {
                set.exclusions.record(reason);
                continue;
            }

            let f = forward.get(&candidate.user_id).copied().unwrap_or(0.0);
            let r = reverse.get(&candidate.user_id).copied().unwrap_or(0.0);
            let combined = bidirectional_combine(f, r);
            if combined < threshold {
                set.exclusions.record(ExclusionReason::BelowThreshold);
                trace!(
                    candidate_id = %candidate.user_id,
                    forward = f,
                    reverse = r,
                    combined,
                    exclusion = logging::EXCLUSION_BELOW_THRESHOLD,
                    "Candidate below threshold"
                );
                continue;
            }

            let candidate_intent = intent_of(candidate);
            let quality = intent_quality(&viewer_intent, &candidate_intent);
            let activity = self.boosts.activity_boost(candidate.last_updated_at, now);
            let temporal = self.boosts.temporal_boost(candidate.created_at, now);

            matches.push(BidirectionalMatch {
                candidate_id: candidate.user_id.clone(),
                forward_score: f,
                reverse_score: r,
                combined_score: combined,
                intent_quality: quality,
                activity_boost: activity,
                temporal_boost: temporal,
                final_score: final_score(combined, quality, activity, temporal),
                reasons: enhanced_reasons(f, r, viewer_intent.intent, candidate_intent.intent),
                gaps: enhanced_gaps(f, r),
            });
        }

        matches.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        matches.truncate(self.config.limit);

        for m in matches {
            let explanation = m
                .reasons
                .first()
                .cloned()
                .unwrap_or_else(|| "Two-way match".to_string());
            let place = |list: MatchList| ScoredCandidate {
                user_id: m.candidate_id.clone(),
                score: m.final_score,
                list,
                match_type: MatchType::Enhanced,
                explanation: explanation.clone(),
                tier: None,
                detail: Some(m.clone()),
            };
            let mut placed = Vec::with_capacity(2);
            if m.forward_score >= threshold {
                placed.push(place(MatchList::Requirements));
            }
            if m.reverse_score >= threshold {
                placed.push(place(MatchList::Offerings));
            }
            set.candidates.extend(placed);
        }
        set.candidates.sort_by(rank_order);

        debug!(
            subsystem = "scoring",
            component = "enhanced",
            user_id = %viewer.user_id,
            forward_hits = forward.len(),
            reverse_hits = reverse.len(),
            candidate_count = both.len(),
            result_count = set.candidates.len(),
            ineligible = set.exclusions.hard_filtered(),
            below_threshold = set.exclusions.below_threshold,
            "Enhanced matching complete"
        );
        Ok(set)
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Enhanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::{FakeIndex, FakeProfiles};

    fn plain(d: Direction) -> VectorKind {
        VectorKind::plain(d)
    }

    struct Fixture {
        index: Arc<FakeIndex>,
        profiles: Arc<FakeProfiles>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                index: Arc::new(FakeIndex::default()),
                profiles: Arc::new(FakeProfiles::default()),
            }
        }

        fn user(&self, profile: Profile, req: Vec<f32>, off: Vec<f32>) {
            self.index
                .put(&profile.user_id, plain(Direction::Requirements), req);
            self.index
                .put(&profile.user_id, plain(Direction::Offerings), off);
            self.profiles.put(profile);
        }

        fn matcher(&self) -> EnhancedMatcher {
            EnhancedMatcher::new(
                MatchingConfig::default(),
                self.index.clone(),
                self.profiles.clone(),
            )
        }
    }

    #[tokio::test]
    async fn mutual_candidate_is_found_in_both_lists() {
        let fx = Fixture::new();
        let viewer = Profile::new("a", "seed funding", "engineering");
        fx.user(viewer.clone(), vec![1.0, 0.0], vec![0.0, 1.0]);
        fx.user(
            Profile::new("b", "engineering help", "seed funding"),
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        );

        let set = fx.matcher().find_candidates(&viewer).await.unwrap();
        assert_eq!(set.candidates.len(), 2);
        assert!(set.candidates.iter().all(|c| c.user_id == "b"));
        let detail = set.candidates[0].detail.as_ref().unwrap();
        assert!((detail.combined_score - 1.0).abs() < 1e-4);
        assert!(detail.final_score > 0.0 && detail.final_score <= 1.0);
    }

    #[tokio::test]
    async fn one_sided_candidate_is_dropped() {
        let fx = Fixture::new();
        let viewer = Profile::new("a", "x", "y");
        fx.user(viewer.clone(), vec![1.0, 0.0], vec![0.0, 1.0]);
        // offers what a needs but needs nothing a offers
        fx.user(Profile::new("c", "z", "w"), vec![1.0, 0.0], vec![1.0, 0.0]);

        let set = fx.matcher().find_candidates(&viewer).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn dealbreaker_synonym_excludes_high_scorer() {
        let fx = Fixture::new();
        let viewer = Profile::new("a", "payments partner", "engineering").with_dealbreakers("crypto");
        fx.user(viewer.clone(), vec![1.0, 0.0], vec![0.0, 1.0]);
        fx.user(
            Profile::new("b", "engineering", "blockchain payments rails"),
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        );

        let set = fx.matcher().find_candidates(&viewer).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.exclusions.dealbreaker, 1);
        assert_eq!(set.exclusions.below_threshold, 0);
    }

    #[tokio::test]
    async fn candidate_dealbreaker_also_excludes() {
        let fx = Fixture::new();
        let viewer = Profile::new("a", "payments", "casino marketing");
        fx.user(viewer.clone(), vec![1.0, 0.0], vec![0.0, 1.0]);
        fx.user(
            Profile::new("b", "marketing", "payments").with_dealbreakers("gambling"),
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        );

        let set = fx.matcher().find_candidates(&viewer).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.exclusions.dealbreaker, 1);
    }

    #[tokio::test]
    async fn same_objective_pair_is_blocked() {
        let fx = Fixture::new();
        let viewer = Profile::new("a", "seed funding for my startup", "a great team");
        fx.user(viewer.clone(), vec![1.0, 0.0], vec![0.0, 1.0]);
        fx.user(
            Profile::new("b", "seed funding for our company", "a great product"),
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        );

        let set = fx.matcher().find_candidates(&viewer).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.exclusions.same_objective, 1);
    }

    #[tokio::test]
    async fn results_sorted_by_final_score() {
        let fx = Fixture::new();
        let viewer = Profile::new("a", "r", "o");
        fx.user(viewer.clone(), vec![1.0, 0.0], vec![0.0, 1.0]);
        fx.user(Profile::new("b", "r", "o"), vec![0.0, 1.0], vec![1.0, 0.0]);
        fx.user(Profile::new("c", "r", "o"), vec![0.3, 1.0], vec![1.0, 0.3]);

        let set = fx.matcher().find_candidates(&viewer).await.unwrap();
        let ids = set.user_ids();
        assert_eq!(ids, vec!["b".to_string(), "c".to_string()]);
    }
}
