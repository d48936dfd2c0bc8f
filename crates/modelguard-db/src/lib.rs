//! Persistence layer for ModelGuard
//!
//! This crate provides the stores the scoring engine talks to:
//! - `ArtifactStore`: metadata records split into the catalog and rejected partitions
//! - `BlobStore`: artifact content, addressed by storage key
//! - In-memory implementations of both
//! - A PostgreSQL `ArtifactStore` with JSONB records, pooling and migrations
//!
//! # Example
//!
//! ```rust,no_run
//! use modelguard_db::{create_pool, PoolConfig, PostgresArtifactStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PoolConfig::new("postgres://localhost/modelguard").max_connections(10);
//! let pool = create_pool(&config).await?;
//! let store = PostgresArtifactStore::new(pool);
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use modelguard_core;

pub mod error;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repository;

pub use error::{DbError, DbResult};
pub use memory::{CatalogSnapshot, InMemoryArtifactStore, InMemoryBlobStore};
pub use pool::{create_pool, mask_password, run_migrations, verify_pool_health, PoolConfig};
pub use postgres::PostgresArtifactStore;
pub use repository::{ArtifactStore, BlobStore, Partition};

// Re-export sqlx types that users may need
pub use sqlx::postgres::PgPool;

/// Default database URL environment variable name
pub const DEFAULT_DATABASE_URL_ENV: &str = "DATABASE_URL";
