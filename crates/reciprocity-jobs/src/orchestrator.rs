//! Inline and scheduled match runs.
//!
//! Both modes share one pipeline:
//!
//! 1. **Recompute**: each user's matches are computed and written over their
//!    own document. Users flagged `profile_changed` first lose their stale
//!    document and ledger rows. Runs with bounded concurrency.
//! 2. **Barrier**: phase 3 starts only after every phase-1 task finished.
//! 3. **Reciprocal + notify**: each recomputed user's capped selection is
//!    mirrored into counterparts' documents, pairs are checked against the
//!    ledger and the backfill rule, one batch is sent, and delivered pairs
//!    are marked. Scheduled runs then clear the "needs matching" flags of
//!    users that were fully processed.
//!
//! A user that fails in either phase is reported and skipped; the rest of
//! the batch continues.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reciprocity_core::defaults::{SWEEP_BATCH_SIZE, SWEEP_MAX_CONCURRENT};
use reciprocity_core::{
    pair_key, Error, MatchDocument, MatchPair, MatchStore, MatchingConfig, NotificationBatch,
    NotificationLedger, NotificationMatch, NotificationSink, PendingReason, PendingUser,
    ProfileRepository, Result, ScoredCandidate, UserId, VectorIndex,
};
use reciprocity_db::Database;
use reciprocity_scoring::{build_algorithm, MatchingAlgorithm};

use crate::sync::{ReciprocalSynchronizer, ReciprocalUpdate};

/// Which entry point started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One user, right after onboarding. Flags are left alone.
    Inline,
    /// Periodic sweep over flagged users.
    Scheduled,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Scheduled => "scheduled",
        }
    }
}

/// Phase a user failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Recompute,
    Reciprocal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedUser {
    pub user_id: UserId,
    pub phase: RunPhase,
    pub error: String,
}

/// What happened to the run's notification batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// No pair needed sending; no call was made.
    NothingToSend,
    Delivered { batch_id: Uuid },
    Failed { batch_id: Uuid, error: String },
    /// The run was cancelled before phase 3.
    NotAttempted,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub users_requested: usize,
    /// Users that completed both phases.
    pub users_processed: usize,
    pub users_failed: Vec<FailedUser>,
    /// Distinct pairs produced after the per-cycle cap.
    pub pairs_created: usize,
    pub pairs_already_notified: usize,
    pub pairs_below_min_score: usize,
    pub pairs_backfilled: usize,
    pub pairs_notified: usize,
    /// New entries written into counterparts' documents.
    pub reciprocal_writes: usize,
    pub notification: NotificationOutcome,
    pub flags_cleared: u64,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunReport {
    fn new(mode: RunMode, users_requested: usize) -> Self {
        Self {
            mode,
            users_requested,
            users_processed: 0,
            users_failed: Vec::new(),
            pairs_created: 0,
            pairs_already_notified: 0,
            pairs_below_min_score: 0,
            pairs_backfilled: 0,
            pairs_notified: 0,
            reciprocal_writes: 0,
            notification: NotificationOutcome::NothingToSend,
            flags_cleared: 0,
            cancelled: false,
            duration_ms: 0,
        }
    }

    fn fail(&mut self, user_id: &str, phase: RunPhase, error: &Error) {
        self.users_failed.push(FailedUser {
            user_id: user_id.to_string(),
            phase,
            error: error.to_string(),
        });
    }
}

/// Everything the orchestrator reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub index: Arc<dyn VectorIndex>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub matches: Arc<dyn MatchStore>,
    pub ledger: Arc<dyn NotificationLedger>,
    pub sink: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// PostgreSQL-backed stores plus the given sink.
    pub fn from_database(db: &Database, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            index: Arc::new(db.vectors.clone()),
            profiles: Arc::new(db.profiles.clone()),
            matches: Arc::new(db.matches.clone()),
            ledger: Arc::new(db.ledger.clone()),
            sink,
        }
    }
}

/// Cancels the runs in progress when fired. Runs started afterwards are
/// unaffected.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    epoch: Arc<AtomicU64>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

/// Cancellation as seen by one run.
#[derive(Clone, Copy)]
struct RunToken<'a> {
    handle: &'a CancelHandle,
    started_at: u64,
}

impl<'a> RunToken<'a> {
    fn new(handle: &'a CancelHandle) -> Self {
        Self {
            handle,
            started_at: handle.epoch(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.handle.epoch() != self.started_at
    }
}

/// Output of phase 1 for one user.
struct Recomputed {
    user_id: UserId,
    /// The flag as listed, cleared only if unchanged at the end of the run.
    listed: PendingUser,
    designation: Option<String>,
    /// The user's document before this run touched it.
    prior: MatchDocument,
    /// Stale matches and ledger rows were dropped for a profile change.
    reset: bool,
    candidates: Vec<ScoredCandidate>,
}

/// Runs matching for single users and for flagged batches.
pub struct MatchOrchestrator {
    config: MatchingConfig,
    algorithm: Arc<dyn MatchingAlgorithm>,
    profiles: Arc<dyn ProfileRepository>,
    matches: Arc<dyn MatchStore>,
    ledger: Arc<dyn NotificationLedger>,
    sink: Arc<dyn NotificationSink>,
    synchronizer: ReciprocalSynchronizer,
    max_concurrent: usize,
    batch_size: usize,
    cancel: CancelHandle,
}

impl MatchOrchestrator {
    /// Build the orchestrator and its reciprocal writers. Must be called
    /// inside a tokio runtime.
    pub fn new(config: MatchingConfig, collaborators: Collaborators) -> Self {
        let algorithm = build_algorithm(
            config.clone(),
            collaborators.index.clone(),
            collaborators.profiles.clone(),
        );
        let synchronizer =
            ReciprocalSynchronizer::new(collaborators.matches.clone(), config.operation_timeout);
        Self {
            config,
            algorithm,
            profiles: collaborators.profiles,
            matches: collaborators.matches,
            ledger: collaborators.ledger,
            sink: collaborators.sink,
            synchronizer,
            max_concurrent: SWEEP_MAX_CONCURRENT,
            batch_size: SWEEP_BATCH_SIZE,
            cancel: CancelHandle::default(),
        }
    }

    /// Maximum users recomputed at once in phase 1.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Maximum flagged users taken by one sweep.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Ask the runs in progress to stop at the next phase boundary, or
    /// between two users in phase 3.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drain the reciprocal writers.
    pub async fn shutdown(self) {
        self.synchronizer.shutdown().await;
    }

    /// Compute one user's matches right after onboarding, propagate them and
    /// notify new pairs. Returns the user's error if they could not be
    /// processed.
    pub async fn run_inline(&self, user_id: &str) -> Result<RunReport> {
        let token = RunToken::new(&self.cancel);
        let users = vec![PendingUser::new(user_id, PendingReason::Pending)];
        let (report, first_error) = self.execute(users, RunMode::Inline, token).await;
        if let Some(e) = first_error {
            return Err(e);
        }
        if report.cancelled && report.users_processed == 0 {
            return Err(Error::Cancelled(format!(
                "inline run for {} stopped before its matches were merged",
                user_id
            )));
        }
        Ok(report)
    }

    /// Process every flagged user (up to the batch size) in one sweep.
    pub async fn run_sweep(&self) -> Result<RunReport> {
        let token = RunToken::new(&self.cancel);
        let users = self
            .bounded("list_pending", self.profiles.list_pending(self.batch_size))
            .await?;
        if users.is_empty() {
            debug!(
                subsystem = "jobs",
                component = "orchestrator",
                mode = RunMode::Scheduled.as_str(),
                "No users need matching"
            );
            return Ok(RunReport::new(RunMode::Scheduled, 0));
        }
        let (report, _) = self.execute(users, RunMode::Scheduled, token).await;
        Ok(report)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.operation_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| {
                Err(Error::Timeout {
                    operation: operation.to_string(),
                    after_ms: limit.as_millis() as u64,
                })
            })
    }

    async fn execute(
        &self,
        users: Vec<PendingUser>,
        mode: RunMode,
        token: RunToken<'_>,
    ) -> (RunReport, Option<Error>) {
        let start = Instant::now();
        let mut report = RunReport::new(mode, users.len());
        let mut first_error = None;

        info!(
            subsystem = "jobs",
            component = "orchestrator",
            mode = mode.as_str(),
            algorithm = %self.algorithm.kind(),
            user_count = users.len(),
            "Match run started"
        );

        if token.is_cancelled() {
            report.cancelled = true;
            report.notification = NotificationOutcome::NotAttempted;
            report.duration_ms = start.elapsed().as_millis() as u64;
            return (report, first_error);
        }

        // Phase 1: recompute. `buffered` keeps input order.
        let tasks: Vec<_> = users
            .iter()
            .map(|pending| async move {
                let result = self.bounded("recompute", self.recompute(pending)).await;
                (pending, result)
            })
            .collect();
        let results: Vec<(&PendingUser, Result<Recomputed>)> = stream::iter(tasks)
            .buffered(self.max_concurrent)
            .collect()
            .await;

        // Phase 2: barrier. Every phase-1 task has completed here.
        let mut recomputed = Vec::with_capacity(results.len());
        for (pending, result) in results {
            match result {
                Ok(r) => recomputed.push(r),
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "orchestrator",
                        phase = "recompute",
                        user_id = %pending.user_id,
                        transient = e.is_transient(),
                        error = %e,
                        "User recompute failed, skipping for this cycle"
                    );
                    report.fail(&pending.user_id, RunPhase::Recompute, &e);
                    first_error.get_or_insert(e);
                }
            }
        }
        recomputed.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        info!(
            subsystem = "jobs",
            component = "orchestrator",
            phase = "recompute",
            mode = mode.as_str(),
            user_count = recomputed.len(),
            failed = report.users_failed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Recompute phase complete"
        );

        if token.is_cancelled() {
            info!(
                subsystem = "jobs",
                component = "orchestrator",
                mode = mode.as_str(),
                "Run cancelled before reciprocal phase"
            );
            report.cancelled = true;
            report.notification = NotificationOutcome::NotAttempted;
            report.duration_ms = start.elapsed().as_millis() as u64;
            return (report, first_error);
        }

        // Phase 3: reciprocal + notify.
        if let Err(e) = self
            .reciprocal_and_notify(&recomputed, mode, token, &mut report)
            .await
        {
            first_error.get_or_insert(e);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            subsystem = "jobs",
            component = "orchestrator",
            mode = mode.as_str(),
            user_count = report.users_processed,
            failed = report.users_failed.len(),
            pair_count = report.pairs_created,
            notified = report.pairs_notified,
            backfilled = report.pairs_backfilled,
            flags_cleared = report.flags_cleared,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Match run complete"
        );
        (report, first_error)
    }

    async fn recompute(&self, pending: &PendingUser) -> Result<Recomputed> {
        let user_id = pending.user_id.as_str();
        let profile = self
            .profiles
            .get(user_id)
            .await?
            .ok_or_else(|| Error::ProfileNotFound(user_id.to_string()))?;

        let prior = match pending.reason {
            PendingReason::ProfileChanged => {
                self.matches.clear(user_id).await?;
                let removed = self.ledger.clear(user_id).await?;
                debug!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    user_id,
                    ledger_rows_removed = removed,
                    "Profile changed, stale matches cleared"
                );
                MatchDocument::empty(user_id)
            }
            PendingReason::Pending => self.matches.get(user_id).await?,
        };

        let set = self.algorithm.find_candidates(&profile).await?;
        let now = Utc::now();
        let mut document = MatchDocument::empty(user_id);
        for candidate in &set.candidates {
            document
                .list_mut(candidate.list)
                .push(candidate.to_entry(now));
        }
        self.matches.replace_document(&document).await?;

        debug!(
            subsystem = "jobs",
            component = "orchestrator",
            phase = "recompute",
            user_id,
            result_count = set.candidates.len(),
            excluded_hard_filter = set.exclusions.hard_filtered(),
            excluded_dealbreaker = set.exclusions.dealbreaker,
            excluded_same_objective = set.exclusions.same_objective,
            excluded_below_threshold = set.exclusions.below_threshold,
            excluded_required_dimension = set.exclusions.required_dimension,
            "User matches recomputed"
        );

        Ok(Recomputed {
            user_id: user_id.to_string(),
            listed: pending.clone(),
            designation: profile.designation.clone(),
            prior,
            reset: pending.reason == PendingReason::ProfileChanged,
            candidates: set.candidates,
        })
    }

    /// The entries that may create new pairs this cycle: the best
    /// `max_matches_per_cycle` distinct users, every list they appear in.
    fn select_for_cycle<'a>(&self, candidates: &'a [ScoredCandidate]) -> Vec<&'a ScoredCandidate> {
        let mut ranked: Vec<&ScoredCandidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.user_id.cmp(&b.user_id))
                .then_with(|| a.list.cmp(&b.list))
        });

        let mut chosen: HashSet<&'a str> = HashSet::new();
        let mut selected = Vec::with_capacity(ranked.len());
        for candidate in ranked {
            if !chosen.contains(candidate.user_id.as_str()) {
                if chosen.len() >= self.config.max_matches_per_cycle {
                    continue;
                }
                chosen.insert(candidate.user_id.as_str());
            }
            selected.push(candidate);
        }
        selected
    }

    async fn reciprocal_and_notify(
        &self,
        recomputed: &[Recomputed],
        mode: RunMode,
        token: RunToken<'_>,
        report: &mut RunReport,
    ) -> Result<()> {
        let selections: Vec<(&Recomputed, Vec<&ScoredCandidate>)> = recomputed
            .iter()
            .map(|r| (r, self.select_for_cycle(&r.candidates)))
            .collect();

        // Pre-run documents: recomputed users recorded theirs in phase 1;
        // other counterparts are read before any reciprocal write.
        let mut prior: HashMap<&str, MatchDocument> = recomputed
            .iter()
            .map(|r| (r.user_id.as_str(), r.prior.clone()))
            .collect();
        let outside: BTreeSet<&str> = selections
            .iter()
            .flat_map(|(_, chosen)| chosen.iter().map(|c| c.user_id.as_str()))
            .filter(|id| !prior.contains_key(id))
            .collect();
        for target in outside {
            match self.bounded("match_get", self.matches.get(target)).await {
                Ok(doc) => {
                    prior.insert(target, doc);
                }
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    phase = "reciprocal",
                    target_id = target,
                    error = %e,
                    "Could not read counterpart document, treating as empty"
                ),
            }
        }

        let reset: HashSet<&str> = recomputed
            .iter()
            .filter(|r| r.reset)
            .map(|r| r.user_id.as_str())
            .collect();

        let mut processed: Vec<&PendingUser> = Vec::new();
        let mut pairs: Vec<MatchPair> = Vec::new();
        let mut pair_index: HashMap<String, usize> = HashMap::new();

        for (source, chosen) in &selections {
            if token.is_cancelled() {
                info!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    phase = "reciprocal",
                    remaining_from = %source.user_id,
                    "Run cancelled, finishing with users already merged"
                );
                report.cancelled = true;
                break;
            }

            let now = Utc::now();
            let updates: Vec<ReciprocalUpdate> = chosen
                .iter()
                .map(|c| ReciprocalUpdate::mirror(&source.user_id, &c.user_id, c.list, c.score, now))
                .collect();

            match self.synchronizer.apply(updates).await {
                Ok(written) => {
                    report.reciprocal_writes += written;
                    for c in chosen {
                        let key = pair_key(&source.user_id, &c.user_id);
                        match pair_index.get(&key) {
                            Some(&i) => {
                                if c.score > pairs[i].score {
                                    pairs[i].score = c.score;
                                }
                            }
                            None => {
                                pair_index.insert(key, pairs.len());
                                pairs.push(MatchPair {
                                    source_id: source.user_id.clone(),
                                    target_id: c.user_id.clone(),
                                    score: c.score,
                                });
                            }
                        }
                    }
                    processed.push(&source.listed);
                }
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "orchestrator",
                        phase = "reciprocal",
                        user_id = %source.user_id,
                        error = %e,
                        "Reciprocal merge failed, skipping user for this cycle"
                    );
                    report.fail(&source.user_id, RunPhase::Reciprocal, &e);
                }
            }
        }
        report.users_processed = processed.len();
        report.pairs_created = pairs.len();

        // Users whose pairs could not be settled keep their flag.
        let mut unsettled: HashSet<UserId> = HashSet::new();
        let mut to_send: Vec<MatchPair> = Vec::new();

        for pair in pairs {
            if pair.score < self.config.notify_min_score {
                report.pairs_below_min_score += 1;
                continue;
            }
            match self
                .bounded(
                    "ledger_check",
                    self.ledger.is_notified(&pair.source_id, &pair.target_id),
                )
                .await
            {
                Ok(true) => {
                    report.pairs_already_notified += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "orchestrator",
                        pair_key = %pair.key(),
                        error = %e,
                        "Ledger check failed, deferring pair"
                    );
                    unsettled.insert(pair.source_id.clone());
                    unsettled.insert(pair.target_id.clone());
                    continue;
                }
            }

            // A profile change makes the pair eligible again whatever the
            // counterpart's document still shows.
            let involves_reset =
                reset.contains(pair.source_id.as_str()) || reset.contains(pair.target_id.as_str());
            let visible = !involves_reset
                && (prior
                    .get(pair.source_id.as_str())
                    .is_some_and(|d| d.contains(&pair.target_id))
                    || prior
                        .get(pair.target_id.as_str())
                        .is_some_and(|d| d.contains(&pair.source_id)));
            if visible {
                match self
                    .bounded(
                        "ledger_backfill",
                        self.ledger
                            .mark_notified(&pair.source_id, &pair.target_id, pair.score),
                    )
                    .await
                {
                    Ok(_) => {
                        report.pairs_backfilled += 1;
                        debug!(
                            subsystem = "jobs",
                            component = "orchestrator",
                            pair_key = %pair.key(),
                            "Pair already visible, backfilled without sending"
                        );
                    }
                    Err(e) => warn!(
                        subsystem = "jobs",
                        component = "orchestrator",
                        pair_key = %pair.key(),
                        error = %e,
                        "Ledger backfill failed"
                    ),
                }
                continue;
            }
            to_send.push(pair);
        }

        if !to_send.is_empty() {
            let batch = self.build_batch(recomputed, &to_send).await;
            let batch_id = batch.batch_id;
            match self.sink.send_batch(&batch).await {
                Ok(()) => {
                    for pair in &to_send {
                        match self
                            .bounded(
                                "ledger_mark",
                                self.ledger
                                    .mark_notified(&pair.source_id, &pair.target_id, pair.score),
                            )
                            .await
                        {
                            Ok(_) => report.pairs_notified += 1,
                            Err(e) => warn!(
                                subsystem = "jobs",
                                component = "orchestrator",
                                batch_id = %batch_id,
                                pair_key = %pair.key(),
                                error = %e,
                                "Delivered pair could not be marked"
                            ),
                        }
                    }
                    report.notification = NotificationOutcome::Delivered { batch_id };
                }
                Err(e) => {
                    error!(
                        subsystem = "jobs",
                        component = "orchestrator",
                        batch_id = %batch_id,
                        pair_count = to_send.len(),
                        error = %e,
                        "Notification batch failed, pairs left unmarked"
                    );
                    for pair in &to_send {
                        unsettled.insert(pair.source_id.clone());
                        unsettled.insert(pair.target_id.clone());
                    }
                    report.notification = NotificationOutcome::Failed {
                        batch_id,
                        error: e.to_string(),
                    };
                }
            }
        }

        if mode == RunMode::Scheduled {
            let done: Vec<PendingUser> = processed
                .into_iter()
                .filter(|u| !unsettled.contains(&u.user_id))
                .cloned()
                .collect();
            match self
                .bounded("clear_flags", self.profiles.clear_needs_matching(&done))
                .await
            {
                Ok(n) => report.flags_cleared = n,
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "orchestrator",
                        user_count = done.len(),
                        error = %e,
                        "Failed to clear needs-matching flags"
                    );
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn build_batch(&self, recomputed: &[Recomputed], pairs: &[MatchPair]) -> NotificationBatch {
        let mut designations: HashMap<UserId, Option<String>> = recomputed
            .iter()
            .map(|r| (r.user_id.clone(), r.designation.clone()))
            .collect();

        let missing: Vec<UserId> = pairs
            .iter()
            .flat_map(|p| [&p.source_id, &p.target_id])
            .filter(|id| !designations.contains_key(id.as_str()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            match self.bounded("profile_get_many", self.profiles.get_many(&missing)).await {
                Ok(profiles) => {
                    for profile in profiles {
                        designations.insert(profile.user_id, profile.designation);
                    }
                }
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    user_count = missing.len(),
                    error = %e,
                    "Could not load counterpart designations"
                ),
            }
        }

        let designation = |id: &str| designations.get(id).cloned().flatten();
        NotificationBatch::new(
            pairs
                .iter()
                .map(|p| NotificationMatch {
                    user_a_id: p.source_id.clone(),
                    user_b_id: p.target_id.clone(),
                    user_a_designation: designation(&p.source_id),
                    user_b_designation: designation(&p.target_id),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reciprocity_core::{MatchList, MatchType};

    fn candidate(id: &str, score: f32, list: MatchList) -> ScoredCandidate {
        ScoredCandidate {
            user_id: id.to_string(),
            score,
            list,
            match_type: MatchType::Simple,
            explanation: String::new(),
            tier: None,
            detail: None,
        }
    }

    struct NoSink;

    #[async_trait::async_trait]
    impl NotificationSink for NoSink {
        async fn send_batch(&self, _batch: &NotificationBatch) -> Result<()> {
            Ok(())
        }
    }

    fn orchestrator(cap: usize) -> MatchOrchestrator {
        use reciprocity_db::{
            InMemoryMatchStore, InMemoryNotificationLedger, InMemoryProfileRepository,
            InMemoryVectorIndex,
        };
        MatchOrchestrator::new(
            MatchingConfig::default().with_max_matches_per_cycle(cap),
            Collaborators {
                index: Arc::new(InMemoryVectorIndex::new()),
                profiles: Arc::new(InMemoryProfileRepository::new()),
                matches: Arc::new(InMemoryMatchStore::new()),
                ledger: Arc::new(InMemoryNotificationLedger::new()),
                sink: Arc::new(NoSink),
            },
        )
    }

    #[tokio::test]
    async fn cap_applies_after_sorting_and_counts_users() {
        let orchestrator = orchestrator(2);
        let candidates = vec![
            candidate("low", 0.55, MatchList::Requirements),
            candidate("top", 0.9, MatchList::Requirements),
            candidate("mid", 0.7, MatchList::Offerings),
            candidate("top", 0.6, MatchList::Offerings),
            candidate("mid-tie", 0.7, MatchList::Requirements),
        ];
        let chosen: Vec<_> = orchestrator
            .select_for_cycle(&candidates)
            .into_iter()
            .map(|c| (c.user_id.as_str(), c.list))
            .collect();
        assert_eq!(
            chosen,
            vec![
                ("top", MatchList::Requirements),
                ("mid", MatchList::Offerings),
                ("top", MatchList::Offerings),
            ]
        );
    }

    #[test]
    fn cancel_reaches_only_runs_already_started() {
        let handle = CancelHandle::default();
        let running = RunToken::new(&handle);
        handle.cancel();
        assert!(running.is_cancelled());
        assert!(!RunToken::new(&handle).is_cancelled());
    }

    #[tokio::test]
    async fn earlier_cancel_does_not_block_later_runs() {
        let orchestrator = orchestrator(10);
        orchestrator.cancel();
        // The run is attempted: the unknown user surfaces as an error.
        let err = orchestrator.run_inline("anyone").await.unwrap_err();
        assert!(matches!(err, Error::ProfileNotFound(_)));

        let report = orchestrator.run_sweep().await.unwrap();
        assert!(!report.cancelled);
    }

    #[test]
    fn report_serializes_outcome_tag() {
        let mut report = RunReport::new(RunMode::Scheduled, 3);
        report.notification = NotificationOutcome::Failed {
            batch_id: Uuid::nil(),
            error: "503".into(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["mode"], "scheduled");
        assert_eq!(value["notification"]["status"], "failed");
    }
}
