//! Fixtures shared by the service unit tests

use async_trait::async_trait;
use modelguard_core::{
    CodeArtifact, DatasetArtifact, DiscoveredReferences, Metadata, ModelArtifact,
    ModelArtifactBuilder,
};
use modelguard_db::{InMemoryArtifactStore, InMemoryBlobStore};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::connections::ConnectionResolver;
use crate::discovery::{Discovery, NoopDiscovery};
use crate::gate::QualityGate;
use crate::locks::ArtifactLocks;
use crate::metrics::MetricRegistry;
use crate::scoring::ScoreEngine;

pub(crate) fn metadata(value: Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

/// A model whose own metadata passes every metric that does not depend on
/// linked code or datasets
pub(crate) fn documented_model(name: &str) -> ModelArtifactBuilder {
    let readme = format!(
        "Reaches 92% accuracy on the standard benchmark. {}",
        "details ".repeat(290)
    );
    ModelArtifact::builder(name, format!("https://huggingface.co/{}", name))
        .license("MIT")
        .size_bytes(500 * 1024 * 1024)
        .metadata_entry("readme", readme)
        .metadata_entry("has_examples", true)
        .metadata_entry("benchmarks", json!([{"task": "squad"}, {"task": "glue"}]))
}

pub(crate) fn healthy_code(name: &str) -> CodeArtifact {
    CodeArtifact::new(name, format!("https://github.com/{}", name)).with_metadata(metadata(json!({
        "has_tests": true,
        "has_ci": true,
        "has_lint": true,
        "contributors": 10,
        "reviewed_fraction": 0.8,
    })))
}

pub(crate) fn documented_dataset(name: &str) -> DatasetArtifact {
    DatasetArtifact::new(name, format!("https://huggingface.co/datasets/{}", name)).with_metadata(
        metadata(json!({
            "description": "Question answering pairs",
            "license": "cc-by-4.0",
            "downloads": 1000,
        })),
    )
}

/// Discovery returning the same references for every model
pub(crate) struct FixedDiscovery(pub DiscoveredReferences);

#[async_trait]
impl Discovery for FixedDiscovery {
    async fn discover(&self, _model: &ModelArtifact) -> DiscoveredReferences {
        self.0.clone()
    }
}

pub(crate) struct Harness {
    pub store: Arc<InMemoryArtifactStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub locks: ArtifactLocks,
    pub engine: Arc<ScoreEngine>,
    pub gate: Arc<QualityGate>,
    pub resolver: Arc<ConnectionResolver>,
}

pub(crate) fn harness() -> Harness {
    harness_with(Arc::new(NoopDiscovery))
}

pub(crate) fn harness_with(discovery: Arc<dyn Discovery>) -> Harness {
    let config = EngineConfig::default();
    let store = Arc::new(InMemoryArtifactStore::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let locks = ArtifactLocks::new();
    let registry = Arc::new(MetricRegistry::builtin(store.clone()));
    let engine = Arc::new(ScoreEngine::new(registry, &config));
    let gate = Arc::new(QualityGate::new(
        store.clone(),
        locks.clone(),
        config.minimum_metric_threshold,
    ));
    let resolver = Arc::new(ConnectionResolver::new(
        store.clone(),
        discovery,
        engine.clone(),
        gate.clone(),
        locks.clone(),
    ));
    Harness {
        store,
        blobs,
        locks,
        engine,
        gate,
        resolver,
    }
}
