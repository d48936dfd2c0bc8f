//! Discovery collaborators
//!
//! Reference names (code repository, dataset, parent model) are pulled out of a
//! model's content by two black-box collaborators: an extractor that returns
//! representative text excerpts, and a classifier that maps excerpts onto named
//! fields. The popularity provider supplies canonical names for confusion
//! checks. None of their answers are trusted; failures degrade to "nothing
//! discovered".

use async_trait::async_trait;
use modelguard_core::{DiscoveredReferences, ModelArtifact};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::error::ServiceResult;

/// Returns representative text excerpts for a stored blob
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// At most `max_excerpts` excerpts of the content at `storage_key`
    async fn extract(&self, storage_key: &str, max_excerpts: usize) -> ServiceResult<Vec<String>>;
}

/// Best-effort mapping of excerpts onto named fields
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FieldClassifier: Send + Sync {
    /// A value (or `None`) for each requested field
    async fn classify(
        &self,
        excerpts: &[String],
        fields: &[String],
    ) -> ServiceResult<HashMap<String, Option<String>>>;
}

/// Source of canonical, popular artifact names
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PopularityProvider: Send + Sync {
    /// Up to `limit` popular names
    async fn popular_names(&self, limit: usize) -> ServiceResult<Vec<String>>;
}

/// Finds reference names for a model
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Candidate references; never fails, returns empty references instead
    async fn discover(&self, model: &ModelArtifact) -> DiscoveredReferences;
}

/// Discovery backed by a content extractor and a field classifier
pub struct ReferenceDiscovery {
    extractor: Arc<dyn ContentExtractor>,
    classifier: Arc<dyn FieldClassifier>,
    max_excerpts: usize,
}

impl ReferenceDiscovery {
    pub fn new(
        extractor: Arc<dyn ContentExtractor>,
        classifier: Arc<dyn FieldClassifier>,
        max_excerpts: usize,
    ) -> Self {
        Self {
            extractor,
            classifier,
            max_excerpts,
        }
    }

    async fn try_discover(&self, model: &ModelArtifact) -> ServiceResult<DiscoveredReferences> {
        let excerpts = self
            .extractor
            .extract(&model.base.storage_key, self.max_excerpts)
            .await?;
        if excerpts.is_empty() {
            return Ok(DiscoveredReferences::default());
        }

        let fields: Vec<String> = DiscoveredReferences::FIELDS
            .iter()
            .map(|f| f.to_string())
            .collect();
        let classified = self.classifier.classify(&excerpts, &fields).await?;

        Ok(DiscoveredReferences::from_fields(|field| {
            classified.get(field).and_then(|v| v.as_deref())
        }))
    }
}

#[async_trait]
impl Discovery for ReferenceDiscovery {
    #[instrument(skip(self, model), fields(artifact_id = %model.id()))]
    async fn discover(&self, model: &ModelArtifact) -> DiscoveredReferences {
        match self.try_discover(model).await {
            Ok(references) => {
                debug!(?references, "Discovered references");
                references
            }
            Err(e) => {
                warn!(error = %e, "Reference discovery failed, leaving links unset");
                DiscoveredReferences::default()
            }
        }
    }
}

/// Discovery that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiscovery;

#[async_trait]
impl Discovery for NoopDiscovery {
    async fn discover(&self, _model: &ModelArtifact) -> DiscoveredReferences {
        DiscoveredReferences::default()
    }
}

/// A fixed list of popular names
#[derive(Debug, Clone, Default)]
pub struct StaticPopularity {
    names: Vec<String>,
}

impl StaticPopularity {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PopularityProvider for StaticPopularity {
    async fn popular_names(&self, limit: usize) -> ServiceResult<Vec<String>> {
        Ok(self.names.iter().take(limit).cloned().collect())
    }
}
