//! Periodic sweep worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use reciprocity_core::defaults::{SWEEP_INTERVAL_SECS, SWEEP_MAX_CONCURRENT};
use reciprocity_core::{Error, Result};

use crate::orchestrator::{MatchOrchestrator, RunReport};

/// Capacity of the worker event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for the sweep worker.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweep starts.
    pub interval: Duration,
    /// Users recomputed concurrently in phase 1.
    pub max_concurrent: usize,
    /// Whether to run sweeps at all.
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
            max_concurrent: SWEEP_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl SweepConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SWEEP_ENABLED` | `true` | Enable/disable scheduled sweeps |
    /// | `SWEEP_INTERVAL_SECS` | `14400` | Seconds between sweeps |
    /// | `SWEEP_MAX_CONCURRENT` | `4` | Concurrent recomputes in phase 1 |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(SWEEP_INTERVAL_SECS);

        let max_concurrent = std::env::var("SWEEP_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(SWEEP_MAX_CONCURRENT)
            .max(1);

        Self {
            interval: Duration::from_secs(interval_secs),
            max_concurrent,
            enabled,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the sweep worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    WorkerStarted,
    SweepStarted,
    SweepCompleted { report: Box<RunReport> },
    SweepFailed { error: String },
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to shut down. A sweep in progress stops at its next
    /// phase boundary.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Wait for the worker loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(subsystem = "jobs", component = "sweep_worker", error = ?e, "Sweep worker panicked");
        }
    }
}

/// Runs [`MatchOrchestrator::run_sweep`] on a fixed interval.
pub struct SweepWorker {
    orchestrator: Arc<MatchOrchestrator>,
    config: SweepConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl SweepWorker {
    pub fn new(orchestrator: Arc<MatchOrchestrator>, config: SweepConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            orchestrator,
            config,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(subsystem = "jobs", component = "sweep_worker", "Sweep worker is disabled, not starting");
            return;
        }

        info!(
            subsystem = "jobs",
            component = "sweep_worker",
            interval_secs = self.config.interval.as_secs(),
            max_concurrent = self.config.max_concurrent,
            "Sweep worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "jobs", component = "sweep_worker", "Sweep worker received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let _ = self.event_tx.send(WorkerEvent::SweepStarted);
            let sweep = self.orchestrator.run_sweep();
            tokio::pin!(sweep);

            // Biased: the sweep must be polled once, taking its cancel
            // snapshot, before a shutdown is acted on.
            let finished = tokio::select! {
                biased;
                result = &mut sweep => Some(result),
                _ = shutdown_rx.recv() => None,
            };
            let stopping = finished.is_none();
            let result = match finished {
                Some(result) => result,
                None => {
                    info!(subsystem = "jobs", component = "sweep_worker", "Shutdown requested mid-sweep, cancelling at next phase boundary");
                    self.orchestrator.cancel();
                    sweep.await
                }
            };

            match result {
                Ok(report) => {
                    let _ = self.event_tx.send(WorkerEvent::SweepCompleted {
                        report: Box::new(report),
                    });
                }
                Err(e) => {
                    error!(subsystem = "jobs", component = "sweep_worker", error = %e, "Sweep failed");
                    let _ = self.event_tx.send(WorkerEvent::SweepFailed {
                        error: e.to_string(),
                    });
                }
            }

            if stopping {
                break;
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!(subsystem = "jobs", component = "sweep_worker", "Sweep worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use reciprocity_core::{
        MatchingConfig, NotificationBatch, NotificationSink, PendingReason, PendingUser, Profile,
        ProfileRepository,
    };
    use reciprocity_db::{
        InMemoryMatchStore, InMemoryNotificationLedger, InMemoryProfileRepository,
        InMemoryVectorIndex,
    };

    use crate::orchestrator::{Collaborators, NotificationOutcome};

    struct DiscardSink;

    #[async_trait]
    impl NotificationSink for DiscardSink {
        async fn send_batch(&self, _batch: &NotificationBatch) -> Result<()> {
            Ok(())
        }
    }

    /// Holds the first profile read until released.
    struct GatedProfiles {
        inner: Arc<InMemoryProfileRepository>,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ProfileRepository for GatedProfiles {
        async fn get(&self, user_id: &str) -> Result<Option<Profile>> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.get(user_id).await
        }

        async fn list_pending(&self, limit: usize) -> Result<Vec<PendingUser>> {
            self.inner.list_pending(limit).await
        }

        async fn clear_needs_matching(&self, users: &[PendingUser]) -> Result<u64> {
            self.inner.clear_needs_matching(users).await
        }
    }

    fn orchestrator(profiles: Arc<dyn ProfileRepository>) -> Arc<MatchOrchestrator> {
        Arc::new(MatchOrchestrator::new(
            MatchingConfig::default(),
            Collaborators {
                index: Arc::new(InMemoryVectorIndex::new()),
                profiles,
                matches: Arc::new(InMemoryMatchStore::new()),
                ledger: Arc::new(InMemoryNotificationLedger::new()),
                sink: Arc::new(DiscardSink),
            },
        ))
    }

    async fn flagged_profiles() -> Arc<InMemoryProfileRepository> {
        let profiles = Arc::new(InMemoryProfileRepository::new());
        profiles
            .insert(Profile::new("a", "seed funding", "engineering"))
            .await;
        profiles.flag("a", PendingReason::Pending).await.unwrap();
        profiles
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_sweeps_on_interval_and_stops_when_idle() {
        let profiles = Arc::new(InMemoryProfileRepository::new());
        let interval = Duration::from_secs(60);
        let worker = SweepWorker::new(
            orchestrator(profiles),
            SweepConfig::default().with_interval(interval),
        );
        let handle = worker.start();
        let mut events = handle.events();
        let started = tokio::time::Instant::now();

        assert!(matches!(events.recv().await.unwrap(), WorkerEvent::WorkerStarted));
        for _ in 0..2 {
            assert!(matches!(events.recv().await.unwrap(), WorkerEvent::SweepStarted));
            match events.recv().await.unwrap() {
                WorkerEvent::SweepCompleted { report } => {
                    assert_eq!(report.users_requested, 0);
                    assert!(!report.cancelled);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(started.elapsed() >= interval);

        handle.shutdown().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), WorkerEvent::WorkerStopped));
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_sweep_cancels_at_barrier() {
        let inner = flagged_profiles().await;
        let gated = Arc::new(GatedProfiles {
            inner: inner.clone(),
            gated: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let handle = SweepWorker::new(orchestrator(gated.clone()), SweepConfig::default()).start();
        let mut events = handle.events();

        gated.entered.notified().await;
        handle.shutdown().await.unwrap();
        // Let the worker act on the shutdown while phase 1 is still held.
        tokio::time::sleep(Duration::from_millis(10)).await;
        gated.release.notify_one();

        assert!(matches!(events.recv().await.unwrap(), WorkerEvent::WorkerStarted));
        assert!(matches!(events.recv().await.unwrap(), WorkerEvent::SweepStarted));
        match events.recv().await.unwrap() {
            WorkerEvent::SweepCompleted { report } => {
                assert!(report.cancelled);
                assert_eq!(report.users_requested, 1);
                assert_eq!(report.users_processed, 0);
                assert_eq!(report.flags_cleared, 0);
                assert!(matches!(report.notification, NotificationOutcome::NotAttempted));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events.recv().await.unwrap(), WorkerEvent::WorkerStopped));
        handle.join().await;

        assert!(inner.is_flagged("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_from_shutdown_does_not_leak_into_next_worker() {
        let inner = flagged_profiles().await;
        let gated = Arc::new(GatedProfiles {
            inner: inner.clone(),
            gated: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let orchestrator = orchestrator(gated.clone());

        let handle = SweepWorker::new(orchestrator.clone(), SweepConfig::default()).start();
        gated.entered.notified().await;
        handle.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        gated.release.notify_one();
        handle.join().await;
        assert!(inner.is_flagged("a").await);

        let handle = SweepWorker::new(orchestrator, SweepConfig::default()).start();
        let mut events = handle.events();
        assert!(matches!(events.recv().await.unwrap(), WorkerEvent::WorkerStarted));
        assert!(matches!(events.recv().await.unwrap(), WorkerEvent::SweepStarted));
        match events.recv().await.unwrap() {
            WorkerEvent::SweepCompleted { report } => {
                assert!(!report.cancelled);
                assert_eq!(report.users_requested, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        handle.shutdown().await.unwrap();
        handle.join().await;
    }

    #[tokio::test]
    async fn test_disabled_worker_exits_without_sweeping() {
        let worker = SweepWorker::new(
            orchestrator(Arc::new(InMemoryProfileRepository::new())),
            SweepConfig::default().with_enabled(false),
        );
        let handle = worker.start();
        let mut events = handle.events();
        handle.join().await;
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_sweep_config_default() {
        let config = SweepConfig::default();
        assert_eq!(config.interval, Duration::from_secs(14_400));
        assert_eq!(config.max_concurrent, 4);
        assert!(config.enabled);
    }

    #[test]
    fn test_sweep_config_builder() {
        let config = SweepConfig::default()
            .with_interval(Duration::from_millis(50))
            .with_enabled(false);
        assert_eq!(config.interval, Duration::from_millis(50));
        assert!(!config.enabled);
    }
}
