//! In-memory store implementations
//!
//! Used by the CLI (backed by a JSON catalog file) and by tests.

use async_trait::async_trait;
use modelguard_core::{Artifact, ArtifactId, ArtifactKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::DbResult;
use crate::repository::{ensure_kind_unchanged, ArtifactStore, BlobStore, Partition};

/// Serializable contents of both partitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub catalog: Vec<Artifact>,
    #[serde(default)]
    pub rejected: Vec<Artifact>,
}

type Records = RwLock<HashMap<ArtifactId, Artifact>>;

/// `ArtifactStore` held in process memory
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    catalog: Records,
    rejected: Records,
}

impl InMemoryArtifactStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a snapshot
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let collect = |items: Vec<Artifact>| -> HashMap<ArtifactId, Artifact> {
            items.into_iter().map(|a| (a.id(), a)).collect()
        };
        Self {
            catalog: RwLock::new(collect(snapshot.catalog)),
            rejected: RwLock::new(collect(snapshot.rejected)),
        }
    }

    /// Replace the catalog partition with the given artifacts
    pub async fn load_catalog(&self, artifacts: Vec<Artifact>) {
        let mut catalog = self.catalog.write().await;
        catalog.clear();
        catalog.extend(artifacts.into_iter().map(|a| (a.id(), a)));
    }

    /// Copy of both partitions, each ordered by id
    pub async fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            catalog: sorted(&*self.catalog.read().await),
            rejected: sorted(&*self.rejected.read().await),
        }
    }

    /// Number of records in a partition
    pub async fn len(&self, partition: Partition) -> usize {
        self.records(partition).read().await.len()
    }

    fn records(&self, partition: Partition) -> &Records {
        match partition {
            Partition::Catalog => &self.catalog,
            Partition::Rejected => &self.rejected,
        }
    }
}

fn sorted(records: &HashMap<ArtifactId, Artifact>) -> Vec<Artifact> {
    let mut items: Vec<Artifact> = records.values().cloned().collect();
    items.sort_by_key(Artifact::id);
    items
}

fn field_matches(artifact: &Artifact, field: &str, value: &str) -> DbResult<bool> {
    let record = artifact.to_record()?;
    Ok(match record.get(field) {
        Some(Value::String(s)) => s.to_lowercase() == value.to_lowercase(),
        _ => false,
    })
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn get(&self, partition: Partition, id: &ArtifactId) -> DbResult<Option<Artifact>> {
        Ok(self.records(partition).read().await.get(id).cloned())
    }

    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id(), partition = %partition))]
    async fn put(&self, partition: Partition, artifact: &Artifact) -> DbResult<()> {
        let mut records = self.records(partition).write().await;
        if let Some(existing) = records.get(&artifact.id()) {
            ensure_kind_unchanged(existing, artifact)?;
        }
        records.insert(artifact.id(), artifact.clone());
        debug!("Artifact stored");
        Ok(())
    }

    async fn delete(&self, partition: Partition, id: &ArtifactId) -> DbResult<bool> {
        Ok(self.records(partition).write().await.remove(id).is_some())
    }

    async fn scan(&self, partition: Partition) -> DbResult<Vec<Artifact>> {
        Ok(sorted(&*self.records(partition).read().await))
    }

    async fn query_by_field(
        &self,
        partition: Partition,
        kind: Option<ArtifactKind>,
        field: &str,
        value: &str,
    ) -> DbResult<Vec<Artifact>> {
        let records = self.records(partition).read().await;
        let mut matches = Vec::new();
        for artifact in records.values() {
            if kind.is_some_and(|k| k != artifact.kind()) {
                continue;
            }
            if field_matches(artifact, field, value)? {
                matches.push(artifact.clone());
            }
        }
        matches.sort_by_key(Artifact::id);
        Ok(matches)
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

/// `BlobStore` that only tracks which keys exist
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    keys: RwLock<HashSet<String>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a blob under `key`
    pub async fn put(&self, key: impl Into<String>) {
        self.keys.write().await.insert(key.into());
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.keys.read().await.contains(key)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn delete(&self, keys: &[String]) -> DbResult<usize> {
        let mut stored = self.keys.write().await;
        let removed = keys.iter().filter(|k| stored.remove(k.as_str())).count();
        debug!(requested = keys.len(), removed, "Blobs deleted");
        Ok(removed)
    }
}
