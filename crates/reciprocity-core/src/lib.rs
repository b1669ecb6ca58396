//! # reciprocity-core
//!
//! Core types, traits, and configuration for the reciprocity matching engine.
//!
//! This crate provides the data model and the trait seams (vector index,
//! match store, notification ledger, notification sink) that the scoring,
//! storage and job crates build on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{AlgorithmKind, MatchingConfig};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
