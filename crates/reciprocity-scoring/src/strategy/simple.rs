//! Two-vector matching: independent forward and reverse lookups.
//!
//! No intersection is required. Each list is thresholded and limited on its
//! own, so a user may appear in one list only.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use reciprocity_core::{
    AlgorithmKind, Direction, MatchList, MatchType, MatchingConfig, Profile, Result,
    ScoredCandidate, VectorIndex, VectorKind,
};

use super::{rank_order, CandidateSet, MatchingAlgorithm};
use crate::explanation::simple_explanation;

pub struct SimpleMatcher {
    config: MatchingConfig,
    index: Arc<dyn VectorIndex>,
}

impl SimpleMatcher {
    pub fn new(config: MatchingConfig, index: Arc<dyn VectorIndex>) -> Self {
        Self { config, index }
    }

    async fn lookup(
        &self,
        viewer: &Profile,
        vector: &[f32],
        direction: Direction,
        list: MatchList,
    ) -> Result<Vec<ScoredCandidate>> {
        let neighbors = self
            .index
            .nearest(
                vector,
                VectorKind::plain(direction.opposite()),
                self.config.similarity_threshold,
                &viewer.user_id,
            )
            .await?;

        let mut candidates: Vec<ScoredCandidate> = neighbors
            .into_iter()
            .filter(|n| n.user_id != viewer.user_id)
            .map(|n| ScoredCandidate {
                explanation: simple_explanation(n.score, list),
                user_id: n.user_id,
                score: n.score,
                list,
                match_type: MatchType::Simple,
                tier: None,
                detail: None,
            })
            .collect();
        candidates.sort_by(rank_order);
        candidates.truncate(self.config.limit);
        Ok(candidates)
    }
}

#[async_trait]
impl MatchingAlgorithm for SimpleMatcher {
    async fn find_candidates(&self, viewer: &Profile) -> Result<CandidateSet> {
        let vectors = self.index.get_vectors(&viewer.user_id).await?;
        let mut set = CandidateSet::default();

        if let Some(req) = vectors.get(&VectorKind::plain(Direction::Requirements)) {
            set.candidates.extend(
                self.lookup(viewer, req, Direction::Requirements, MatchList::Requirements)
                    .await?,
            );
        }
        if let Some(off) = vectors.get(&VectorKind::plain(Direction::Offerings)) {
            set.candidates.extend(
                self.lookup(viewer, off, Direction::Offerings, MatchList::Offerings)
                    .await?,
            );
        }
        set.candidates.sort_by(rank_order);

        debug!(
            subsystem = "scoring",
            component = "simple",
            user_id = %viewer.user_id,
            result_count = set.candidates.len(),
            "Simple matching complete"
        );
        Ok(set)
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Simple
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::FakeIndex;

    fn plain(d: Direction) -> VectorKind {
        VectorKind::plain(d)
    }

    #[tokio::test]
    async fn lists_are_independent() {
        let index = Arc::new(FakeIndex::default());
        index.put("viewer", plain(Direction::Requirements), vec![1.0, 0.0]);
        index.put("viewer", plain(Direction::Offerings), vec![0.0, 1.0]);
        // offers what viewer needs, but needs nothing viewer offers
        index.put("x", plain(Direction::Offerings), vec![1.0, 0.0]);
        index.put("x", plain(Direction::Requirements), vec![1.0, 0.0]);
        // needs what viewer offers
        index.put("y", plain(Direction::Requirements), vec![0.0, 1.0]);

        let matcher = SimpleMatcher::new(MatchingConfig::default(), index);
        let set = matcher
            .find_candidates(&Profile::new("viewer", "", ""))
            .await
            .unwrap();

        assert_eq!(set.candidates.len(), 2);
        let x = set.candidates.iter().find(|c| c.user_id == "x").unwrap();
        assert_eq!(x.list, MatchList::Requirements);
        let y = set.candidates.iter().find(|c| c.user_id == "y").unwrap();
        assert_eq!(y.list, MatchList::Offerings);
        assert!(x.explanation.starts_with("Excellent match"));
    }

    #[tokio::test]
    async fn missing_vectors_yield_empty() {
        let index = Arc::new(FakeIndex::default());
        let matcher = SimpleMatcher::new(MatchingConfig::default(), index);
        let set = matcher
            .find_candidates(&Profile::new("nobody", "", ""))
            .await
            .unwrap();
        assert!(set.is_empty());
    }
}
