//! Reciprocal propagation of matches into counterparts' documents.
//!
//! Each [`ReciprocalUpdate`] is routed to a writer task chosen by hashing the
//! target user id, so all writes to one counterpart go through one task in
//! submission order. Writers use `UpsertMode::AppendIfAbsent`, which leaves
//! existing entries untouched.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use reciprocity_core::defaults::{SYNC_WRITER_QUEUE_DEPTH, SYNC_WRITER_SHARDS};
use reciprocity_core::{
    Error, MatchList, MatchStore, MatchType, Result, StoredMatchEntry, UpsertMode, UserId,
};
use reciprocity_scoring::explanation::reciprocal_explanation;

/// A match computed for `source` that should appear in `target`'s document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReciprocalUpdate {
    pub source: UserId,
    pub target: UserId,
    /// List in the target's document.
    pub list: MatchList,
    pub entry: StoredMatchEntry,
}

impl ReciprocalUpdate {
    /// Mirror of a match the source holds in `source_list`.
    pub fn mirror(
        source: &str,
        target: &str,
        source_list: MatchList,
        score: f32,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let list = source_list.reciprocal();
        Self {
            source: source.to_string(),
            target: target.to_string(),
            list,
            entry: StoredMatchEntry {
                matched_user_id: source.to_string(),
                similarity_score: score,
                match_type: MatchType::Reciprocal,
                explanation: reciprocal_explanation(list, score),
                created_at: now,
            },
        }
    }
}

struct Envelope {
    update: ReciprocalUpdate,
    reply: oneshot::Sender<Result<bool>>,
}

/// Sharded single-writer queue over a [`MatchStore`].
pub struct ReciprocalSynchronizer {
    shards: Vec<mpsc::Sender<Envelope>>,
    writers: Vec<JoinHandle<()>>,
}

impl ReciprocalSynchronizer {
    /// Spawn the default number of writer tasks. Must be called inside a
    /// tokio runtime.
    pub fn new(store: Arc<dyn MatchStore>, operation_timeout: Duration) -> Self {
        Self::with_shards(store, SYNC_WRITER_SHARDS, operation_timeout)
    }

    pub fn with_shards(
        store: Arc<dyn MatchStore>,
        shard_count: usize,
        operation_timeout: Duration,
    ) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        let mut writers = Vec::with_capacity(shard_count);

        for shard in 0..shard_count {
            let (tx, rx) = mpsc::channel(SYNC_WRITER_QUEUE_DEPTH);
            let store = store.clone();
            writers.push(tokio::spawn(run_writer(
                shard,
                store,
                rx,
                operation_timeout,
            )));
            shards.push(tx);
        }

        Self { shards, writers }
    }

    fn shard_for(&self, target: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        target.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Queue one update and wait for its writer. `Ok(true)` means a new entry
    /// was written, `Ok(false)` that the target already listed the source.
    pub async fn submit(&self, update: ReciprocalUpdate) -> Result<bool> {
        if update.source == update.target {
            return Err(Error::InvalidInput(format!(
                "reciprocal update from {} to itself",
                update.source
            )));
        }
        let (reply, rx) = oneshot::channel();
        let shard = self.shard_for(&update.target);
        self.shards[shard]
            .send(Envelope { update, reply })
            .await
            .map_err(|_| Error::Internal("reciprocal writer stopped".into()))?;
        rx.await
            .map_err(|_| Error::Internal("reciprocal writer dropped reply".into()))?
    }

    /// Apply all of one source user's updates. Fails if any update fails;
    /// updates that already succeeded stay written.
    pub async fn apply(&self, updates: Vec<ReciprocalUpdate>) -> Result<usize> {
        let results = join_all(updates.into_iter().map(|u| self.submit(u))).await;
        let mut written = 0;
        for result in results {
            if result? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Close the queues and wait for writers to drain.
    pub async fn shutdown(self) {
        drop(self.shards);
        for writer in self.writers {
            if let Err(e) = writer.await {
                warn!(
                    subsystem = "jobs",
                    component = "reciprocal_sync",
                    error = ?e,
                    "Reciprocal writer task panicked"
                );
            }
        }
    }
}

async fn run_writer(
    shard: usize,
    store: Arc<dyn MatchStore>,
    mut rx: mpsc::Receiver<Envelope>,
    operation_timeout: Duration,
) {
    while let Some(Envelope { update, reply }) = rx.recv().await {
        let write = store.upsert(
            &update.target,
            update.list,
            vec![update.entry],
            UpsertMode::AppendIfAbsent,
        );
        let result = match tokio::time::timeout(operation_timeout, write).await {
            Ok(Ok(written)) => Ok(written > 0),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Timeout {
                operation: "reciprocal_upsert".to_string(),
                after_ms: operation_timeout.as_millis() as u64,
            }),
        };

        debug!(
            subsystem = "jobs",
            component = "reciprocal_sync",
            shard,
            user_id = %update.source,
            target_id = %update.target,
            list = %update.list,
            success = result.is_ok(),
            "Reciprocal update applied"
        );
        // The caller may have given up waiting.
        let _ = reply.send(result);
    }
}
