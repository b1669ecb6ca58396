//! Embedding a profile's texts into the vector index.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use reciprocity_core::{
    Direction, EmbeddingBackend, Error, Profile, Result, VectorIndex, VectorKind,
};

/// Turns profile text into stored dimension vectors.
pub struct ProfileIndexer {
    embedder: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn VectorIndex>,
}

impl ProfileIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Texts to embed for a profile: the plain requirements/offerings texts
    /// plus every non-empty per-dimension text.
    pub fn texts_for(profile: &Profile) -> Vec<(VectorKind, String)> {
        let mut texts = Vec::new();
        for direction in [Direction::Requirements, Direction::Offerings] {
            let plain = profile.text(direction).trim();
            if !plain.is_empty() {
                texts.push((VectorKind::plain(direction), plain.to_string()));
            }
            for (dimension, text) in profile.dimensions(direction) {
                let text = text.trim();
                if !text.is_empty() {
                    texts.push((VectorKind::dimension(direction, *dimension), text.to_string()));
                }
            }
        }
        texts
    }

    /// Embed and store every vector for the profile, superseding older ones.
    /// Returns how many vectors were stored.
    pub async fn index_profile(&self, profile: &Profile) -> Result<usize> {
        let start = Instant::now();
        let texts = Self::texts_for(profile);
        if texts.is_empty() {
            let removed = self.index.retain_kinds(&profile.user_id, &[]).await?;
            debug!(
                subsystem = "jobs",
                component = "indexer",
                user_id = %profile.user_id,
                removed,
                "Profile has no text to embed"
            );
            return Ok(0);
        }

        let inputs: Vec<String> = texts.iter().map(|(_, t)| t.clone()).collect();
        let vectors = self.embedder.embed_texts(&inputs).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} vectors from {}, got {}",
                texts.len(),
                self.embedder.model_name(),
                vectors.len()
            )));
        }

        let expected = self.embedder.dimension();
        for ((kind, _), vector) in texts.iter().zip(vectors) {
            if vector.len() != expected {
                return Err(Error::Embedding(format!(
                    "{} vector for {} has dimension {}, expected {}",
                    kind,
                    profile.user_id,
                    vector.len(),
                    expected
                )));
            }
            self.index
                .store_vector(&profile.user_id, *kind, vector)
                .await?;
        }

        // Kinds whose text was emptied by an edit must stop matching.
        let kinds: Vec<VectorKind> = texts.iter().map(|(kind, _)| *kind).collect();
        let removed = self.index.retain_kinds(&profile.user_id, &kinds).await?;

        info!(
            subsystem = "jobs",
            component = "indexer",
            user_id = %profile.user_id,
            model = self.embedder.model_name(),
            result_count = texts.len(),
            removed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Profile vectors stored"
        );
        Ok(texts.len())
    }
}
