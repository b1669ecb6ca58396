//! Matching strategies.
//!
//! The orchestrator holds one [`MatchingAlgorithm`] chosen from
//! [`AlgorithmKind`] at startup. All three share the scoring primitives in
//! this crate and read vectors and profiles through the core traits.

mod enhanced;
mod multi_vector;
mod simple;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use reciprocity_core::{
    AlgorithmKind, MatchingConfig, Profile, ProfileRepository, Result, ScoredCandidate, UserId,
    VectorIndex,
};

use crate::hard_filter::ExclusionStats;

pub use enhanced::EnhancedMatcher;
pub use multi_vector::MultiVectorMatcher;
pub use simple::SimpleMatcher;

/// Ranked candidates for one viewer plus what was left out and why.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Best first. A user may appear once per list.
    pub candidates: Vec<ScoredCandidate>,
    pub exclusions: ExclusionStats,
}

impl CandidateSet {
    /// Distinct candidate ids in rank order.
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut seen = std::collections::HashSet::new();
        self.candidates
            .iter()
            .filter(|c| seen.insert(c.user_id.as_str()))
            .map(|c| c.user_id.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A way of producing ranked candidates for a viewer.
#[async_trait]
pub trait MatchingAlgorithm: Send + Sync {
    /// Compute the viewer's candidates. A viewer without vectors yields an
    /// empty set, not an error.
    async fn find_candidates(&self, viewer: &Profile) -> Result<CandidateSet>;

    /// Which strategy this is.
    fn kind(&self) -> AlgorithmKind;
}

/// Build the strategy selected by `config.algorithm`.
pub fn build_algorithm(
    config: MatchingConfig,
    index: Arc<dyn VectorIndex>,
    profiles: Arc<dyn ProfileRepository>,
) -> Arc<dyn MatchingAlgorithm> {
    match config.algorithm {
        AlgorithmKind::Simple => Arc::new(SimpleMatcher::new(config, index)),
        AlgorithmKind::MultiVector => Arc::new(MultiVectorMatcher::new(config, index)),
        AlgorithmKind::Enhanced => Arc::new(EnhancedMatcher::new(config, index, profiles)),
    }
}

/// Score descending, ties broken by user id so results are deterministic.
pub(crate) fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.user_id.cmp(&b.user_id))
        .then_with(|| a.list.cmp(&b.list))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Small in-crate fakes for strategy tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use reciprocity_core::{
        Neighbor, PendingUser, Profile, ProfileRepository, Result, UserId, VectorIndex,
        VectorKind,
    };

    use crate::combine::cosine;

    #[derive(Default)]
    pub struct FakeIndex {
        pub vectors: Mutex<HashMap<UserId, HashMap<VectorKind, Vec<f32>>>>,
    }

    impl FakeIndex {
        pub fn put(&self, user: &str, kind: VectorKind, v: Vec<f32>) {
            self.vectors
                .lock()
                .unwrap()
                .entry(user.to_string())
                .or_default()
                .insert(kind, v);
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn store_vector(&self, user_id: &str, kind: VectorKind, vector: Vec<f32>) -> Result<()> {
            self.put(user_id, kind, vector);
            Ok(())
        }

        async fn nearest(
            &self,
            vector: &[f32],
            kind: VectorKind,
            threshold: f32,
            exclude: &str,
        ) -> Result<Vec<Neighbor>> {
            let map = self.vectors.lock().unwrap();
            let mut hits: Vec<Neighbor> = map
                .iter()
                .filter(|(id, _)| id.as_str() != exclude)
                .filter_map(|(id, kinds)| {
                    kinds.get(&kind).map(|v| Neighbor {
                        user_id: id.clone(),
                        score: cosine(vector, v),
                    })
                })
                .filter(|n| n.score >= threshold)
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            Ok(hits)
        }

        async fn get_vectors(&self, user_id: &str) -> Result<HashMap<VectorKind, Vec<f32>>> {
            Ok(self
                .vectors
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn retain_kinds(&self, user_id: &str, keep: &[VectorKind]) -> Result<u64> {
            let mut map = self.vectors.lock().unwrap();
            let Some(kinds) = map.get_mut(user_id) else {
                return Ok(0);
            };
            let before = kinds.len();
            kinds.retain(|kind, _| keep.contains(kind));
            Ok((before - kinds.len()) as u64)
        }
    }

    #[derive(Default)]
    pub struct FakeProfiles {
        pub profiles: Mutex<HashMap<UserId, Profile>>,
    }

    impl FakeProfiles {
        pub fn put(&self, profile: Profile) {
            self.profiles
                .lock()
                .unwrap()
                .insert(profile.user_id.clone(), profile);
        }
    }

    #[async_trait]
    impl ProfileRepository for FakeProfiles {
        async fn get(&self, user_id: &str) -> Result<Option<Profile>> {
            Ok(self.profiles.lock().unwrap().get(user_id).cloned())
        }

        async fn list_pending(&self, _limit: usize) -> Result<Vec<PendingUser>> {
            Ok(Vec::new())
        }

        async fn clear_needs_matching(&self, _users: &[PendingUser]) -> Result<u64> {
            Ok(0)
        }
    }
}
