//! Quality gate
//!
//! Admission control over per-metric scores. Models with any leaf score
//! strictly below the configured minimum go to the rejected partition, where
//! they stay invisible to catalog scans and queries until promoted.

use modelguard_core::{scores_below_threshold, Artifact, ModelArtifact};
use modelguard_db::{ArtifactStore, Partition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::error::{ServiceError, ServiceResult};
use crate::locks::ArtifactLocks;

/// Where a model landed and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub partition: Partition,
    /// Score keys below the threshold; empty when admitted to the catalog
    pub failing: Vec<String>,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        self.partition == Partition::Catalog
    }
}

/// Threshold check plus catalog/rejected placement
pub struct QualityGate {
    store: Arc<dyn ArtifactStore>,
    locks: ArtifactLocks,
    threshold: f64,
}

impl QualityGate {
    pub fn new(store: Arc<dyn ArtifactStore>, locks: ArtifactLocks, threshold: f64) -> Self {
        Self {
            store,
            locks,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Leaf score keys strictly below the threshold.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if any stored score is not a finite number.
    pub fn scores_below_threshold(&self, model: &ModelArtifact) -> ServiceResult<Vec<String>> {
        Ok(scores_below_threshold(&model.scores, self.threshold)?)
    }

    /// Whether every leaf score meets the threshold
    pub fn passes(&self, model: &ModelArtifact) -> ServiceResult<bool> {
        Ok(self.scores_below_threshold(model)?.is_empty())
    }

    /// Persist a freshly scored model into the catalog or the rejected partition
    #[instrument(skip(self, model), fields(artifact_id = %model.id()))]
    pub async fn admit(&self, model: &ModelArtifact) -> ServiceResult<Admission> {
        let failing = self.scores_below_threshold(model)?;
        let partition = if failing.is_empty() {
            Partition::Catalog
        } else {
            Partition::Rejected
        };

        let _guard = self.locks.acquire(model.id()).await;
        self.store
            .put(partition, &Artifact::Model(model.clone()))
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to persist admitted model");
                ServiceError::from(e)
            })?;

        if failing.is_empty() {
            info!("Model admitted to catalog");
        } else {
            info!(failing = ?failing, "Model rejected by quality gate");
        }

        Ok(Admission { partition, failing })
    }

    /// Move a model from the rejected partition into the catalog
    #[instrument(skip(self, model), fields(artifact_id = %model.id()))]
    pub async fn promote(&self, model: &ModelArtifact) -> ServiceResult<()> {
        let _guard = self.locks.acquire(model.id()).await;
        self.promote_held(model).await
    }

    /// Promote only if the model now passes; returns whether it was promoted
    pub async fn try_promote(&self, model: &ModelArtifact) -> ServiceResult<bool> {
        if !self.passes(model)? {
            return Ok(false);
        }
        self.promote(model).await?;
        Ok(true)
    }

    /// Promotion for callers already holding the model's lock.
    ///
    /// Inserts into the catalog before deleting from the rejected partition so
    /// the record is never absent from both.
    pub(crate) async fn promote_held(&self, model: &ModelArtifact) -> ServiceResult<()> {
        self.store
            .put(Partition::Catalog, &Artifact::Model(model.clone()))
            .await?;
        self.store.delete(Partition::Rejected, &model.id()).await?;
        info!(artifact_id = %model.id(), "Model promoted to catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelguard_core::score::names;
    use modelguard_core::{ScoreValue, NET_SCORE};
    use modelguard_db::InMemoryArtifactStore;

    fn scored(scores: &[(&str, f64)]) -> ModelArtifact {
        let mut model = ModelArtifact::builder("bert", "https://hf.co/bert").build().unwrap();
        for (name, value) in scores {
            model.scores.insert(name.to_string(), ScoreValue::Scalar(*value));
        }
        model
    }

    fn gate() -> (QualityGate, Arc<InMemoryArtifactStore>) {
        let store = Arc::new(InMemoryArtifactStore::new());
        (QualityGate::new(store.clone(), ArtifactLocks::new(), 0.5), store)
    }

    #[tokio::test]
    async fn test_passing_model_goes_to_catalog() {
        let (gate, store) = gate();
        let model = scored(&[(names::LICENSE, 1.0), (NET_SCORE, 0.9)]);

        let admission = gate.admit(&model).await.unwrap();
        assert!(admission.is_admitted());
        assert!(store.get(Partition::Catalog, &model.id()).await.unwrap().is_some());
        assert_eq!(store.len(Partition::Rejected).await, 0);
    }

    #[tokio::test]
    async fn test_failing_model_goes_to_rejected() {
        let (gate, store) = gate();
        let mut model = scored(&[(names::LICENSE, 0.3), (NET_SCORE, 0.6)]);
        model.scores.insert(
            names::SIZE.to_string(),
            ScoreValue::breakdown([("raspberry_pi", 0.9), ("jetson_nano", 0.2)]),
        );

        let admission = gate.admit(&model).await.unwrap();
        assert_eq!(admission.partition, Partition::Rejected);
        assert_eq!(admission.failing, vec!["License", "Size.jetson_nano"]);
        assert!(store.get(Partition::Catalog, &model.id()).await.unwrap().is_none());
        assert!(store.scan(Partition::Catalog).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_score_is_a_validation_error() {
        let (gate, store) = gate();
        let model = scored(&[(names::LICENSE, f64::INFINITY)]);

        let err = gate.admit(&model).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
        assert_eq!(store.len(Partition::Catalog).await, 0);
        assert_eq!(store.len(Partition::Rejected).await, 0);
    }

    #[tokio::test]
    async fn test_promote_moves_record() {
        let (gate, store) = gate();
        let mut model = scored(&[(names::LICENSE, 0.1)]);
        gate.admit(&model).await.unwrap();

        model.scores.insert(names::LICENSE.to_string(), ScoreValue::Scalar(0.9));
        assert!(gate.try_promote(&model).await.unwrap());
        assert!(store.get(Partition::Rejected, &model.id()).await.unwrap().is_none());
        let stored = store.get(Partition::Catalog, &model.id()).await.unwrap().unwrap();
        assert_eq!(stored.as_model().unwrap().scores[names::LICENSE], ScoreValue::Scalar(0.9));
    }

    #[tokio::test]
    async fn test_try_promote_keeps_failing_model_rejected() {
        let (gate, store) = gate();
        let model = scored(&[(names::LICENSE, 0.1)]);
        gate.admit(&model).await.unwrap();

        assert!(!gate.try_promote(&model).await.unwrap());
        assert!(store.get(Partition::Rejected, &model.id()).await.unwrap().is_some());
    }
}
