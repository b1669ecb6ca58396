//! # reciprocity-jobs
//!
//! Match orchestration for the reciprocity matching engine.
//!
//! This crate provides:
//! - [`MatchOrchestrator`]: inline (post-onboarding) and scheduled three-phase runs
//! - [`ReciprocalSynchronizer`]: single writer per counterpart for reciprocal entries
//! - [`WebhookNotificationSink`]: one signed POST per notification batch
//! - [`ProfileIndexer`]: profile text to stored dimension vectors
//! - [`SweepWorker`]: the periodic sweep loop with a shutdown handle
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reciprocity_jobs::{Collaborators, MatchOrchestrator, SweepConfig, SweepWorker};
//!
//! let db = Database::connect("postgres://...").await?;
//! let sink = Arc::new(WebhookNotificationSink::new(WebhookConfig::new("http://backend"))?);
//! let orchestrator = Arc::new(MatchOrchestrator::new(
//!     MatchingConfig::from_env()?,
//!     Collaborators::from_database(&db, sink),
//! ));
//!
//! let handle = SweepWorker::new(orchestrator, SweepConfig::from_env()).start();
//! handle.shutdown().await?;
//! ```

pub mod indexing;
pub mod notify;
pub mod orchestrator;
pub mod sync;
pub mod worker;

// Re-export core types
pub use reciprocity_core::*;

pub use indexing::ProfileIndexer;
pub use notify::{sign_body, WebhookConfig, WebhookNotificationSink};
pub use orchestrator::{
    CancelHandle, Collaborators, FailedUser, MatchOrchestrator, NotificationOutcome, RunMode,
    RunPhase, RunReport,
};
pub use sync::{ReciprocalSynchronizer, ReciprocalUpdate};
pub use worker::{SweepConfig, SweepWorker, WorkerEvent, WorkerHandle};
