//! Core traits for the matching engine's external seams.
//!
//! Every collaborator the engine reads from or writes to sits behind one of
//! these traits, so storage backends can be swapped and tests can run against
//! in-memory implementations.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// EMBEDDING TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("backend returned no vectors".to_string()))
    }
}

// =============================================================================
// VECTOR INDEX TRAITS
// =============================================================================

/// Similarity-search store holding every user's dimension vectors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store a vector, superseding any previous vector of the same kind.
    async fn store_vector(&self, user_id: &str, kind: VectorKind, vector: Vec<f32>) -> Result<()>;

    /// Users whose `kind` vector scores at or above `threshold` against `vector`,
    /// best first, never including `exclude`.
    async fn nearest(
        &self,
        vector: &[f32],
        kind: VectorKind,
        threshold: f32,
        exclude: &str,
    ) -> Result<Vec<Neighbor>>;

    /// All stored vectors for a user. Empty when the user has none yet.
    async fn get_vectors(&self, user_id: &str) -> Result<HashMap<VectorKind, Vec<f32>>>;

    /// Delete every vector of the user whose kind is not in `keep`.
    /// Returns how many were deleted.
    async fn retain_kinds(&self, user_id: &str, keep: &[VectorKind]) -> Result<u64>;
}

// =============================================================================
// PROFILE TRAITS
// =============================================================================

/// Read access to profiles and the "needs matching" flag.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch one profile.
    async fn get(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Fetch several profiles, skipping unknown ids.
    async fn get_many(&self, user_ids: &[UserId]) -> Result<Vec<Profile>> {
        let mut profiles = Vec::with_capacity(user_ids.len());
        for id in user_ids {
            if let Some(profile) = self.get(id).await? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    /// Users currently flagged "needs matching", oldest first.
    async fn list_pending(&self, limit: usize) -> Result<Vec<PendingUser>>;

    /// Clear the flag of each listed user whose flag version still equals
    /// the listed one. Users re-flagged since keep their flag. Returns how
    /// many were cleared.
    async fn clear_needs_matching(&self, users: &[PendingUser]) -> Result<u64>;
}

// =============================================================================
// MATCH STORE TRAITS
// =============================================================================

/// Per-user document of outbound match lists.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// The owner's document, or an empty one if none exists.
    async fn get(&self, owner: &str) -> Result<MatchDocument>;

    /// Write entries into one of the owner's lists.
    ///
    /// `Replace` discards the existing list first. `AppendIfAbsent` adds only
    /// entries whose `matched_user_id` is not already listed and must be atomic
    /// per document. Returns the number of entries actually written.
    async fn upsert(
        &self,
        owner: &str,
        list: MatchList,
        entries: Vec<StoredMatchEntry>,
        mode: UpsertMode,
    ) -> Result<usize>;

    /// Replace both of the owner's lists with the document's contents.
    ///
    /// The default runs two separate `Replace` upserts, so a reader may see
    /// one list replaced and the other not. Stores that need the document
    /// swapped atomically must override this.
    async fn replace_document(&self, document: &MatchDocument) -> Result<()> {
        self.upsert(
            &document.owner,
            MatchList::Requirements,
            document.requirements_matches.clone(),
            UpsertMode::Replace,
        )
        .await?;
        self.upsert(
            &document.owner,
            MatchList::Offerings,
            document.offerings_matches.clone(),
            UpsertMode::Replace,
        )
        .await?;
        Ok(())
    }

    /// Remove every entry the owner has.
    async fn clear(&self, owner: &str) -> Result<()>;
}

// =============================================================================
// NOTIFICATION TRAITS
// =============================================================================

/// Idempotency store for pair notifications, keyed by [`pair_key`].
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Whether the pair has a ledger row.
    async fn is_notified(&self, a: &str, b: &str) -> Result<bool> {
        Ok(self.get(a, b).await?.is_some())
    }

    /// Create the row, or bump its count and overwrite time and score.
    async fn mark_notified(&self, a: &str, b: &str, score: f32) -> Result<NotifiedPair>;

    /// The pair's ledger row, if any.
    async fn get(&self, a: &str, b: &str) -> Result<Option<NotifiedPair>>;

    /// Remove every row involving the user. Returns how many were removed.
    async fn clear(&self, user_id: &str) -> Result<u64>;
}

/// Outbound delivery of a notification batch.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver the batch. `Ok` means the receiver confirmed it.
    async fn send_batch(&self, batch: &NotificationBatch) -> Result<()>;
}
