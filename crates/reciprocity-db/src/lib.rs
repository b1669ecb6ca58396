//! # reciprocity-db
//!
//! PostgreSQL storage for the reciprocity matching engine.
//!
//! - [`PgVectorIndex`]: pgvector-backed similarity search over dimension vectors
//! - [`PgProfileRepository`]: profiles and the "needs matching" flag
//! - [`PgMatchStore`]: per-user match documents
//! - [`PgNotificationLedger`]: notified-pair idempotency rows
//!
//! The [`memory`] module holds in-memory equivalents for tests and
//! single-process use.

pub mod ledger;
pub mod matches;
pub mod memory;
pub mod pool;
pub mod profiles;
pub mod vectors;

// Always compiled so integration tests (in tests/) can use it
pub mod test_fixtures;

// Re-export core types
pub use reciprocity_core::*;

pub use ledger::PgNotificationLedger;
pub use matches::PgMatchStore;
pub use memory::{
    InMemoryMatchStore, InMemoryNotificationLedger, InMemoryProfileRepository,
    InMemoryVectorIndex,
};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use profiles::PgProfileRepository;
pub use vectors::PgVectorIndex;

use sqlx::{Pool, Postgres};

/// Database wrapper providing access to all repositories.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Postgres>,
    pub vectors: PgVectorIndex,
    pub profiles: PgProfileRepository,
    pub matches: PgMatchStore,
    pub ledger: PgNotificationLedger,
}

impl Database {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            vectors: PgVectorIndex::new(pool.clone()),
            profiles: PgProfileRepository::new(pool.clone()),
            matches: PgMatchStore::new(pool.clone()),
            ledger: PgNotificationLedger::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}
