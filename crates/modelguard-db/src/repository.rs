//! Store trait abstractions for artifact persistence
//!
//! This module defines the `ArtifactStore` and `BlobStore` traits that abstract
//! persistence, allowing for different implementations (PostgreSQL, in-memory).

use async_trait::async_trait;
use modelguard_core::{Artifact, ArtifactId, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

/// Which side of the quality gate a record lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// The visible catalog
    Catalog,
    /// Models that failed the quality gate; hidden from search and discovery
    Rejected,
}

impl Partition {
    /// Get the string representation of the partition
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Catalog => "catalog",
            Partition::Rejected => "rejected",
        }
    }

    /// Both partitions, catalog first
    pub const ALL: [Partition; 2] = [Partition::Catalog, Partition::Rejected];
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Partition {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catalog" => Ok(Partition::Catalog),
            "rejected" => Ok(Partition::Rejected),
            other => Err(DbError::InvalidData(format!("Unknown partition: {}", other))),
        }
    }
}

/// Metadata store for artifact records.
///
/// Every operation is scoped to a partition. Records in the rejected partition
/// never appear in catalog scans or queries.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch an artifact by id
    async fn get(&self, partition: Partition, id: &ArtifactId) -> DbResult<Option<Artifact>>;

    /// Insert or replace an artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if a record with the same id but a different kind
    /// already exists in the partition.
    async fn put(&self, partition: Partition, artifact: &Artifact) -> DbResult<()>;

    /// Delete an artifact; returns whether a record was removed
    async fn delete(&self, partition: Partition, id: &ArtifactId) -> DbResult<bool>;

    /// All artifacts in a partition, ordered by id
    async fn scan(&self, partition: Partition) -> DbResult<Vec<Artifact>>;

    /// Artifacts whose top-level record `field` equals `value`, ignoring case
    async fn query_by_field(
        &self,
        partition: Partition,
        kind: Option<ArtifactKind>,
        field: &str,
        value: &str,
    ) -> DbResult<Vec<Artifact>>;

    /// Check store connectivity
    async fn health_check(&self) -> DbResult<()>;

    /// Look up an id in the catalog, then the rejected partition
    async fn locate(&self, id: &ArtifactId) -> DbResult<Option<(Partition, Artifact)>> {
        for partition in Partition::ALL {
            if let Some(artifact) = self.get(partition, id).await? {
                return Ok(Some((partition, artifact)));
            }
        }
        Ok(None)
    }
}

/// Content store holding artifact blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Delete blobs by key; returns how many were actually removed
    async fn delete(&self, keys: &[String]) -> DbResult<usize>;
}

/// Reject a write that would change the kind of an existing record
pub(crate) fn ensure_kind_unchanged(existing: &Artifact, incoming: &Artifact) -> DbResult<()> {
    existing.ensure_same_kind(incoming).map_err(DbError::from)
}
