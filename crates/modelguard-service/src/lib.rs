//! Scoring and lineage engine for ModelGuard
//!
//! This crate holds the engine that sits between a request-handling layer and
//! the stores: metric evaluation, connection resolution, lineage queries,
//! admission control, update arbitration and package-confusion detection.
//!
//! # Architecture
//!
//! - **ScoreEngine**: runs the [`MetricRegistry`] concurrently and computes the NetScore
//! - **ConnectionResolver**: links models to their code, datasets, parents and children
//! - **LineageService**: ancestor chain plus direct children of a model
//! - **QualityGate**: threshold check and catalog/rejected placement
//! - **UpdateArbitrator**: decides whether a candidate supersedes a stored record
//! - **PackageConfusionService**: near-duplicate name detection
//! - **IngestionService**: drives new and updated artifacts through all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use modelguard_db::{InMemoryArtifactStore, InMemoryBlobStore};
//! use modelguard_service::ServiceRegistryBuilder;
//! use std::sync::Arc;
//!
//! # fn example() -> modelguard_service::ServiceResult<()> {
//! let services = ServiceRegistryBuilder::new()
//!     .store(Arc::new(InMemoryArtifactStore::new()))
//!     .blobs(Arc::new(InMemoryBlobStore::new()))
//!     .build()?;
//! # let _ = services;
//! # Ok(())
//! # }
//! ```

pub mod arbitration;
pub mod config;
pub mod confusion;
pub mod connections;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod ingestion;
pub mod lineage;
pub mod locks;
pub mod metrics;
pub mod scoring;

#[cfg(test)]
mod test_support;

pub use arbitration::{UpdateArbitrator, UpdateDecision};
pub use config::EngineConfig;
pub use confusion::PackageConfusionService;
pub use connections::ConnectionResolver;
pub use discovery::{
    ContentExtractor, Discovery, FieldClassifier, NoopDiscovery, PopularityProvider,
    ReferenceDiscovery, StaticPopularity,
};
pub use error::{MetricError, ServiceError, ServiceResult};
pub use gate::{Admission, QualityGate};
pub use ingestion::{IngestOutcome, IngestionService};
pub use lineage::LineageService;
pub use locks::ArtifactLocks;
pub use metrics::{saturating_scale, Metric, MetricCategory, MetricRegistry, MetricSubset};
pub use scoring::ScoreEngine;

use modelguard_db::{ArtifactStore, BlobStore};
use std::sync::Arc;

/// All engine services, wired to the same stores and locks
#[derive(Clone)]
pub struct ServiceRegistry {
    pub engine: Arc<ScoreEngine>,
    pub resolver: Arc<ConnectionResolver>,
    pub lineage: Arc<LineageService>,
    pub gate: Arc<QualityGate>,
    pub arbitrator: Arc<UpdateArbitrator>,
    pub confusion: Arc<PackageConfusionService>,
    pub ingestion: Arc<IngestionService>,
    pub locks: ArtifactLocks,
    pub config: EngineConfig,
}

/// Builder for [`ServiceRegistry`]
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    store: Option<Arc<dyn ArtifactStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    discovery: Option<Arc<dyn Discovery>>,
    popularity: Option<Arc<dyn PopularityProvider>>,
    metrics: Option<MetricRegistry>,
    config: EngineConfig,
}

impl ServiceRegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metadata store
    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the blob store
    pub fn blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Set the reference discovery; defaults to [`NoopDiscovery`]
    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Set the popular-name source; defaults to an empty list
    pub fn popularity(mut self, popularity: Arc<dyn PopularityProvider>) -> Self {
        self.popularity = Some(popularity);
        self
    }

    /// Use a custom metric registry instead of the built-in metrics
    pub fn metrics(mut self, metrics: MetricRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the service registry
    ///
    /// # Errors
    ///
    /// Returns an error if a store is missing or the configuration is invalid.
    pub fn build(self) -> ServiceResult<ServiceRegistry> {
        let store = self
            .store
            .ok_or_else(|| ServiceError::InvalidInput("Artifact store is required".to_string()))?;
        let blobs = self
            .blobs
            .ok_or_else(|| ServiceError::InvalidInput("Blob store is required".to_string()))?;
        let config = self.config;
        config.validate()?;

        let discovery = self.discovery.unwrap_or_else(|| Arc::new(NoopDiscovery));
        let popularity = self
            .popularity
            .unwrap_or_else(|| Arc::new(StaticPopularity::default()));
        let metrics = self
            .metrics
            .unwrap_or_else(|| MetricRegistry::builtin(store.clone()));

        let locks = ArtifactLocks::new();
        let engine = Arc::new(ScoreEngine::new(Arc::new(metrics), &config));
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
        let lineage = Arc::new(LineageService::new(store.clone()));
        let arbitrator = Arc::new(UpdateArbitrator::new(store.clone(), blobs, locks.clone()));
        let confusion = Arc::new(PackageConfusionService::new(
            store.clone(),
            popularity,
            config.confusion.clone(),
            config.popular_names_limit,
            config.popular_names_ttl(),
            locks.clone(),
        ));
        let ingestion = Arc::new(IngestionService::new(
            store,
            engine.clone(),
            resolver.clone(),
            gate.clone(),
            arbitrator.clone(),
            locks.clone(),
        ));

        Ok(ServiceRegistry {
            engine,
            resolver,
            lineage,
            gate,
            arbitrator,
            confusion,
            ingestion,
            locks,
            config,
        })
    }
}
