//! Update arbitration
//!
//! Decides whether a freshly ingested candidate replaces an existing catalog
//! record. Models are compared by NetScore; code and datasets always update.
//!
//! NetScore handling when a value is missing:
//!
//! | old     | candidate | decision |
//! |---------|-----------|----------|
//! | present | present   | accept iff `candidate >= old` |
//! | present | missing   | reject |
//! | missing | present   | accept |
//! | missing | missing   | reject |
//!
//! A NetScore that is non-finite or stored as a breakdown is malformed input.

use chrono::Utc;
use modelguard_core::{Artifact, ModelArtifact, ScoreValue, NET_SCORE};
use modelguard_db::{ArtifactStore, BlobStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::locks::ArtifactLocks;

/// Outcome of an update request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum UpdateDecision {
    /// The stored record now holds the candidate's metadata
    Accepted { artifact: Artifact },
    /// The existing record was left untouched
    Rejected { reason: String },
}

impl UpdateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UpdateDecision::Accepted { .. })
    }
}

/// Read the NetScore for arbitration
fn arbitration_score(model: &ModelArtifact, role: &str) -> ServiceResult<Option<f64>> {
    match model.scores.get(NET_SCORE) {
        None => Ok(None),
        Some(ScoreValue::Scalar(v)) if v.is_finite() => Ok(Some(*v)),
        Some(other) => Err(ServiceError::ValidationFailed(format!(
            "{} NetScore is not a finite number: {}",
            role, other
        ))),
    }
}

/// Compares candidates against stored records and applies accepted updates
pub struct UpdateArbitrator {
    store: Arc<dyn ArtifactStore>,
    blobs: Arc<dyn BlobStore>,
    locks: ArtifactLocks,
}

impl UpdateArbitrator {
    pub fn new(store: Arc<dyn ArtifactStore>, blobs: Arc<dyn BlobStore>, locks: ArtifactLocks) -> Self {
        Self { store, blobs, locks }
    }

    /// Arbitrate `candidate` against the stored record `old`.
    ///
    /// On reject the candidate's blob is deleted and `old` is untouched. On
    /// accept the record at `old.id` is overwritten with the candidate's
    /// metadata and old's blob is deleted.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the kinds differ, `NotFound` if `old` is not stored,
    /// `ValidationFailed` on a malformed NetScore. Store failures propagate.
    #[instrument(skip(self, old, candidate), fields(artifact_id = %old.id(), kind = %old.kind()))]
    pub async fn arbitrate_update(&self, old: &Artifact, candidate: Artifact) -> ServiceResult<UpdateDecision> {
        old.ensure_same_kind(&candidate)?;

        let _guard = self.locks.acquire(old.id()).await;
        let Some((partition, current)) = self.store.locate(&old.id()).await? else {
            return Err(ServiceError::NotFound(old.id().to_string()));
        };

        if let (Artifact::Model(old_model), Artifact::Model(new_model)) = (&current, &candidate) {
            if let Some(reason) = Self::rejection_reason(old_model, new_model)? {
                self.discard_candidate_blob(&current, &candidate).await?;
                info!(reason = %reason, "Update rejected");
                return Ok(UpdateDecision::Rejected { reason });
            }
        }

        let merged = Self::merge(&current, candidate);
        self.store.put(partition, &merged).await?;
        self.discard_old_blob(&current, &merged).await?;

        info!(partition = %partition, "Update accepted");
        Ok(UpdateDecision::Accepted { artifact: merged })
    }

    fn rejection_reason(old: &ModelArtifact, candidate: &ModelArtifact) -> ServiceResult<Option<String>> {
        let old_score = arbitration_score(old, "Existing")?;
        let new_score = arbitration_score(candidate, "Candidate")?;

        Ok(match (old_score, new_score) {
            (Some(old), Some(new)) if new < old => Some(format!(
                "Candidate NetScore {:.3} is below existing {:.3}",
                new, old
            )),
            (Some(_), Some(_)) | (None, Some(_)) => None,
            (Some(_), None) => Some("Candidate has no NetScore".to_string()),
            (None, None) => Some("Neither version has a NetScore".to_string()),
        })
    }

    /// Candidate metadata under the existing identity
    fn merge(current: &Artifact, candidate: Artifact) -> Artifact {
        let mut merged = candidate;
        {
            let base = merged.base_mut();
            base.id = current.id();
            base.created_at = current.base().created_at;
            base.updated_at = Utc::now();
        }

        if let (Some(old), Some(new)) = (current.as_model(), merged.as_model_mut()) {
            new.code_artifact_id = old.code_artifact_id.or(new.code_artifact_id);
            new.dataset_artifact_id = old.dataset_artifact_id.or(new.dataset_artifact_id);
            if old.parent_model_id.is_some() {
                new.parent_model_id = old.parent_model_id;
                new.parent_model_source = old.parent_model_source.clone();
                new.parent_model_relationship = old.parent_model_relationship.clone();
            }
            if new.parent_model_id == Some(old.id()) {
                new.parent_model_id = None;
            }
            new.child_model_ids.extend(old.child_model_ids.iter().copied());
            new.child_model_ids.remove(&old.id());
        }
        merged
    }

    async fn discard_candidate_blob(&self, current: &Artifact, candidate: &Artifact) -> ServiceResult<()> {
        if candidate.storage_key() == current.storage_key() {
            warn!("Candidate shares the existing storage key, keeping blob");
            return Ok(());
        }
        let removed = self.blobs.delete(&[candidate.storage_key().to_string()]).await?;
        info!(storage_key = %candidate.storage_key(), removed, "Discarded candidate blob");
        Ok(())
    }

    async fn discard_old_blob(&self, current: &Artifact, merged: &Artifact) -> ServiceResult<()> {
        if merged.storage_key() == current.storage_key() {
            return Ok(());
        }
        let removed = self.blobs.delete(&[current.storage_key().to_string()]).await?;
        info!(storage_key = %current.storage_key(), removed, "Discarded superseded blob");
        Ok(())
    }
}
