//! In-memory implementations of the storage traits.
//!
//! Used by the job crate's tests and by single-process deployments that do
//! not need persistence. Semantics mirror the PostgreSQL implementations.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use reciprocity_core::{
    pair_key, Error, MatchDocument, MatchList, MatchStore, Neighbor, NotificationLedger,
    NotifiedPair, PendingReason, PendingUser, Profile, ProfileRepository, Result,
    StoredMatchEntry, UpsertMode, UserId, VectorIndex, VectorKind,
};
use reciprocity_scoring::cosine;

// =============================================================================
// VECTOR INDEX
// =============================================================================

#[derive(Default)]
pub struct InMemoryVectorIndex {
    vectors: RwLock<HashMap<UserId, HashMap<VectorKind, Vec<f32>>>>,
    failing: RwLock<HashSet<UserId>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every lookup of `user_id`'s own vectors fail.
    pub async fn fail_for(&self, user_id: &str) {
        self.failing.write().await.insert(user_id.to_string());
    }

    pub async fn reset(&self) {
        self.vectors.write().await.clear();
        self.failing.write().await.clear();
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn store_vector(&self, user_id: &str, kind: VectorKind, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::InvalidInput(format!(
                "empty {} vector for {}",
                kind, user_id
            )));
        }
        self.vectors
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .insert(kind, vector);
        Ok(())
    }

    async fn nearest(
        &self,
        vector: &[f32],
        kind: VectorKind,
        threshold: f32,
        exclude: &str,
    ) -> Result<Vec<Neighbor>> {
        let vectors = self.vectors.read().await;
        let mut neighbors: Vec<Neighbor> = vectors
            .iter()
            .filter(|(user_id, _)| user_id.as_str() != exclude)
            .filter_map(|(user_id, kinds)| {
                let theirs = kinds.get(&kind)?;
                if theirs.len() != vector.len() {
                    return None;
                }
                let score = cosine(vector, theirs);
                (score >= threshold).then(|| Neighbor {
                    user_id: user_id.clone(),
                    score,
                })
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(neighbors)
    }

    async fn get_vectors(&self, user_id: &str) -> Result<HashMap<VectorKind, Vec<f32>>> {
        if self.failing.read().await.contains(user_id) {
            return Err(Error::VectorIndex(format!(
                "vector lookup failed for {}",
                user_id
            )));
        }
        Ok(self
            .vectors
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn retain_kinds(&self, user_id: &str, keep: &[VectorKind]) -> Result<u64> {
        let mut vectors = self.vectors.write().await;
        let Some(kinds) = vectors.get_mut(user_id) else {
            return Ok(0);
        };
        let before = kinds.len();
        kinds.retain(|kind, _| keep.contains(kind));
        let removed = (before - kinds.len()) as u64;
        if kinds.is_empty() {
            vectors.remove(user_id);
        }
        Ok(removed)
    }
}

// =============================================================================
// PROFILES
// =============================================================================

struct Flag {
    /// Listing order; set when the flag is first raised.
    seq: u64,
    /// Bumped on every flag call.
    version: i64,
    reason: PendingReason,
}

#[derive(Default)]
struct ProfileState {
    profiles: HashMap<UserId, Profile>,
    flags: HashMap<UserId, Flag>,
    next_seq: u64,
    next_version: i64,
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    state: RwLock<ProfileState>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: Profile) {
        self.state
            .write()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile);
    }

    /// Flag a user; `profile_changed` is never downgraded to `pending`.
    pub async fn flag(&self, user_id: &str, reason: PendingReason) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(user_id) {
            return Err(Error::ProfileNotFound(user_id.to_string()));
        }
        state.next_version += 1;
        let version = state.next_version;
        let seq = state.next_seq;
        match state.flags.get_mut(user_id) {
            Some(flag) => {
                flag.version = version;
                if flag.reason != PendingReason::ProfileChanged {
                    flag.reason = reason;
                }
            }
            None => {
                state.flags.insert(
                    user_id.to_string(),
                    Flag {
                        seq,
                        version,
                        reason,
                    },
                );
                state.next_seq += 1;
            }
        }
        Ok(())
    }

    pub async fn is_flagged(&self, user_id: &str) -> bool {
        self.state.read().await.flags.contains_key(user_id)
    }

    pub async fn reset(&self) {
        *self.state.write().await = ProfileState::default();
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<PendingUser>> {
        let state = self.state.read().await;
        let mut flagged: Vec<_> = state.flags.iter().collect();
        flagged.sort_by(|(a_id, a), (b_id, b)| a.seq.cmp(&b.seq).then_with(|| a_id.cmp(b_id)));
        Ok(flagged
            .into_iter()
            .take(limit)
            .map(|(user_id, flag)| {
                PendingUser::new(user_id.clone(), flag.reason).with_flag_version(flag.version)
            })
            .collect())
    }

    async fn clear_needs_matching(&self, users: &[PendingUser]) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut cleared = 0;
        for user in users {
            let current = state.flags.get(&user.user_id).map(|f| f.version);
            if current == Some(user.flag_version) {
                state.flags.remove(&user.user_id);
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

// =============================================================================
// MATCH STORE
// =============================================================================

#[derive(Default)]
pub struct InMemoryMatchStore {
    documents: RwLock<BTreeMap<UserId, MatchDocument>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every non-empty document, by owner.
    pub async fn snapshot(&self) -> BTreeMap<UserId, MatchDocument> {
        self.documents
            .read()
            .await
            .iter()
            .filter(|(_, doc)| !doc.is_empty())
            .map(|(owner, doc)| (owner.clone(), doc.clone()))
            .collect()
    }

    pub async fn reset(&self) {
        self.documents.write().await.clear();
    }
}

fn dedup_entries(entries: Vec<StoredMatchEntry>) -> Vec<StoredMatchEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.matched_user_id.clone()))
        .collect()
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn get(&self, owner: &str) -> Result<MatchDocument> {
        Ok(self
            .documents
            .read()
            .await
            .get(owner)
            .cloned()
            .unwrap_or_else(|| MatchDocument::empty(owner)))
    }

    async fn upsert(
        &self,
        owner: &str,
        list: MatchList,
        entries: Vec<StoredMatchEntry>,
        mode: UpsertMode,
    ) -> Result<usize> {
        // The write lock makes the check-and-append atomic per document.
        let mut documents = self.documents.write().await;
        let document = documents
            .entry(owner.to_string())
            .or_insert_with(|| MatchDocument::empty(owner));
        let target = document.list_mut(list);

        let written = match mode {
            UpsertMode::Replace => {
                *target = dedup_entries(entries);
                target.len()
            }
            UpsertMode::AppendIfAbsent => {
                let mut written = 0;
                for entry in entries {
                    if target
                        .iter()
                        .all(|e| e.matched_user_id != entry.matched_user_id)
                    {
                        target.push(entry);
                        written += 1;
                    }
                }
                written
            }
        };
        document.updated_at = Some(Utc::now());
        Ok(written)
    }

    async fn replace_document(&self, document: &MatchDocument) -> Result<()> {
        let mut stored = document.clone();
        stored.requirements_matches = dedup_entries(stored.requirements_matches);
        stored.offerings_matches = dedup_entries(stored.offerings_matches);
        stored.updated_at = Some(Utc::now());
        self.documents
            .write()
            .await
            .insert(document.owner.clone(), stored);
        Ok(())
    }

    async fn clear(&self, owner: &str) -> Result<()> {
        self.documents.write().await.remove(owner);
        Ok(())
    }
}

// =============================================================================
// NOTIFICATION LEDGER
// =============================================================================

#[derive(Default)]
pub struct InMemoryNotificationLedger {
    pairs: RwLock<HashMap<String, NotifiedPair>>,
}

impl InMemoryNotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, sorted by pair key.
    pub async fn all(&self) -> Vec<NotifiedPair> {
        let mut rows: Vec<_> = self.pairs.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.pair_key.cmp(&b.pair_key));
        rows
    }

    pub async fn reset(&self) {
        self.pairs.write().await.clear();
    }
}

#[async_trait]
impl NotificationLedger for InMemoryNotificationLedger {
    async fn mark_notified(&self, a: &str, b: &str, score: f32) -> Result<NotifiedPair> {
        if a == b {
            return Err(Error::InvalidInput(format!("cannot pair {} with itself", a)));
        }
        let key = pair_key(a, b);
        let now = Utc::now();
        let mut pairs = self.pairs.write().await;
        let row = pairs
            .entry(key.clone())
            .and_modify(|row| {
                row.notified_at = now;
                row.notification_count += 1;
                row.last_similarity_score = score;
            })
            .or_insert_with(|| {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                NotifiedPair {
                    pair_key: key,
                    user_a_id: lo.to_string(),
                    user_b_id: hi.to_string(),
                    notified_at: now,
                    notification_count: 1,
                    last_similarity_score: score,
                }
            });
        Ok(row.clone())
    }

    async fn get(&self, a: &str, b: &str) -> Result<Option<NotifiedPair>> {
        Ok(self.pairs.read().await.get(&pair_key(a, b)).cloned())
    }

    async fn clear(&self, user_id: &str) -> Result<u64> {
        let mut pairs = self.pairs.write().await;
        let before = pairs.len();
        pairs.retain(|_, row| row.user_a_id != user_id && row.user_b_id != user_id);
        Ok((before - pairs.len()) as u64)
    }
}
