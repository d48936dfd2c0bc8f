//! Common test utilities and helpers
//!
//! Every test app runs the full service registry against fresh in-memory
//! stores.

#![allow(dead_code)]

use async_trait::async_trait;
use modelguard_core::{Artifact, ArtifactId, DiscoveredReferences, ModelArtifact};
use modelguard_db::{ArtifactStore, InMemoryArtifactStore, InMemoryBlobStore, Partition};
use modelguard_service::{
    Discovery, IngestOutcome, ServiceRegistry, ServiceRegistryBuilder, StaticPopularity,
};
use std::sync::Arc;

pub mod fixtures;

/// Test application state
pub struct TestApp {
    pub store: Arc<InMemoryArtifactStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub services: ServiceRegistry,
}

impl TestApp {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    /// Ingest an artifact and record its blob, as an upload would
    pub async fn ingest(&self, artifact: impl Into<Artifact>) -> IngestOutcome {
        let artifact = artifact.into();
        self.blobs.put(artifact.storage_key()).await;
        self.services
            .ingestion
            .ingest(artifact)
            .await
            .expect("Failed to ingest artifact")
    }

    /// Current stored model and its partition
    pub async fn model(&self, id: ArtifactId) -> (Partition, ModelArtifact) {
        let (partition, artifact) = self
            .store
            .locate(&id)
            .await
            .expect("Store lookup failed")
            .expect("Artifact missing");
        let model = artifact.into_model().expect("Artifact is not a model");
        (partition, model)
    }

    pub async fn store_lookup(&self, id: ArtifactId) -> Option<(Partition, Artifact)> {
        self.store.locate(&id).await.expect("Store lookup failed")
    }

    pub async fn partition_of(&self, id: ArtifactId) -> Option<Partition> {
        self.store_lookup(id).await.map(|(partition, _)| partition)
    }
}

#[derive(Default)]
pub struct TestAppBuilder {
    discovery: Option<Arc<dyn Discovery>>,
    popular: Vec<String>,
}

impl TestAppBuilder {
    pub fn discovery(mut self, discovery: impl Discovery + 'static) -> Self {
        self.discovery = Some(Arc::new(discovery));
        self
    }

    pub fn popular(mut self, names: &[&str]) -> Self {
        self.popular = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(InMemoryArtifactStore::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let mut builder = ServiceRegistryBuilder::new()
            .store(store.clone())
            .blobs(blobs.clone())
            .popularity(Arc::new(StaticPopularity::new(self.popular)));
        if let Some(discovery) = self.discovery {
            builder = builder.discovery(discovery);
        }
        let services = builder.build().expect("Failed to build services");
        TestApp {
            store,
            blobs,
            services,
        }
    }
}

/// Discovery that answers from a fixed table keyed by model name
pub struct TableDiscovery(pub Vec<(String, DiscoveredReferences)>);

#[async_trait]
impl Discovery for TableDiscovery {
    async fn discover(&self, model: &ModelArtifact) -> DiscoveredReferences {
        self.0
            .iter()
            .find(|(name, _)| name == model.name())
            .map(|(_, refs)| refs.clone())
            .unwrap_or_default()
    }
}
