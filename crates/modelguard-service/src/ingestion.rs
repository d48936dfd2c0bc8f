//! Ingestion orchestration
//!
//! A create or update request runs in-line through the engine: connection
//! resolution, scoring, then the quality gate or the update arbitrator.

use modelguard_core::{Artifact, ArtifactId, ConnectionEdge, ModelArtifact};
use modelguard_db::{ArtifactStore, Partition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::arbitration::{UpdateArbitrator, UpdateDecision};
use crate::connections::ConnectionResolver;
use crate::error::{ServiceError, ServiceResult};
use crate::gate::QualityGate;
use crate::locks::ArtifactLocks;
use crate::scoring::ScoreEngine;

/// Result of ingesting one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// The artifact as stored
    pub artifact: Artifact,
    pub partition: Partition,
    /// Score keys that kept a model out of the catalog
    pub failing_metrics: Vec<String>,
    /// Links created while ingesting
    pub edges: Vec<ConnectionEdge>,
}

/// Drives new and updated artifacts through the engine
pub struct IngestionService {
    store: Arc<dyn ArtifactStore>,
    engine: Arc<ScoreEngine>,
    resolver: Arc<ConnectionResolver>,
    gate: Arc<QualityGate>,
    arbitrator: Arc<UpdateArbitrator>,
    locks: ArtifactLocks,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        engine: Arc<ScoreEngine>,
        resolver: Arc<ConnectionResolver>,
        gate: Arc<QualityGate>,
        arbitrator: Arc<UpdateArbitrator>,
        locks: ArtifactLocks,
    ) -> Self {
        Self {
            store,
            engine,
            resolver,
            gate,
            arbitrator,
            locks,
        }
    }

    /// Ingest a new artifact.
    ///
    /// Models are linked, fully scored, admitted to the catalog or the
    /// rejected partition, then adopt any stored children waiting for them.
    /// Code and datasets are stored in the catalog and linked into the models
    /// referencing them.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the id is already stored; validation and store
    /// errors propagate.
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id(), kind = %artifact.kind()))]
    pub async fn ingest(&self, artifact: Artifact) -> ServiceResult<IngestOutcome> {
        artifact.validate()?;
        if self.store.locate(&artifact.id()).await?.is_some() {
            return Err(ServiceError::AlreadyExists(artifact.id().to_string()));
        }

        match artifact {
            Artifact::Model(model) => self.ingest_model(model).await,
            other => {
                self.store.put(Partition::Catalog, &other).await?;
                let edges = self.resolver.link_dependents(&other).await?;
                info!(linked = edges.len(), "Artifact ingested");
                Ok(IngestOutcome {
                    artifact: other,
                    partition: Partition::Catalog,
                    failing_metrics: Vec::new(),
                    edges,
                })
            }
        }
    }

    async fn ingest_model(&self, mut model: ModelArtifact) -> ServiceResult<IngestOutcome> {
        let mut edges = self.resolver.link_references(&mut model).await?;
        self.engine.score_artifact(&mut model).await;
        let admission = self.gate.admit(&model).await?;

        let adopted = self.resolver.adopt_children(&mut model).await?;
        let mut partition = admission.partition;
        if !adopted.is_empty() {
            // The stored record may have been linked or promoted since admission
            let children: Vec<ArtifactId> = adopted.iter().map(|edge| edge.from_id).collect();
            if let Some((current_partition, current)) =
                self.resolver.record_children(model.id(), &children).await?
            {
                partition = current_partition;
                model = current;
            }
        }
        edges.extend(adopted);

        let failing_metrics = if partition == Partition::Catalog {
            Vec::new()
        } else {
            admission.failing
        };

        info!(
            partition = %partition,
            net_score = ?model.net_score(),
            linked = edges.len(),
            "Model ingested"
        );
        Ok(IngestOutcome {
            artifact: Artifact::Model(model),
            partition,
            failing_metrics,
            edges,
        })
    }

    /// Arbitrate a candidate replacing the stored artifact `old_id`.
    ///
    /// A model candidate has its references resolved and is scored first.
    /// Its own id is never stored, so the parent only learns of the update
    /// once it is accepted, under the stored id. The candidate's blob is
    /// expected to be stored already; the arbitrator discards whichever blob
    /// loses.
    #[instrument(skip(self, candidate), fields(artifact_id = %old_id))]
    pub async fn update(&self, old_id: &ArtifactId, mut candidate: Artifact) -> ServiceResult<UpdateDecision> {
        candidate.validate()?;
        let Some((_, old)) = self.store.locate(old_id).await? else {
            return Err(ServiceError::NotFound(old_id.to_string()));
        };
        old.ensure_same_kind(&candidate)?;

        if let Artifact::Model(model) = &mut candidate {
            self.resolver.resolve_references(model).await?;
            self.engine.score_artifact(model).await;
        }

        let decision = self.arbitrator.arbitrate_update(&old, candidate).await?;
        if let UpdateDecision::Accepted {
            artifact: Artifact::Model(model),
        } = &decision
        {
            if let Some(parent_id) = model.parent_model_id {
                self.resolver.record_children(parent_id, &[model.id()]).await?;
            }
        }
        Ok(decision)
    }

    /// Rescore a stored model and persist the new scores in place
    #[instrument(skip(self), fields(artifact_id = %id))]
    pub async fn rescore(&self, id: &ArtifactId) -> ServiceResult<ModelArtifact> {
        let Some((_, artifact)) = self.store.locate(id).await? else {
            return Err(ServiceError::NotFound(id.to_string()));
        };
        let Some(mut model) = artifact.into_model() else {
            return Err(ServiceError::InvalidInput(format!("{} is not a model", id)));
        };
        self.engine.score_artifact(&mut model).await;

        let _guard = self.locks.acquire(model.id()).await;
        // Links may have moved while scoring ran outside the lock
        let Some((partition, Artifact::Model(mut current))) = self.store.locate(id).await? else {
            return Err(ServiceError::NotFound(id.to_string()));
        };
        current.scores = model.scores;
        current.scores_latency = model.scores_latency;
        current.base.touch();
        self.store
            .put(partition, &Artifact::Model(current.clone()))
            .await?;
        Ok(current)
    }
}
