//! Package-confusion detection
//!
//! Flags models whose names are near-duplicates of popular names while their
//! own trust signals are weak. Popular names come from the popularity
//! collaborator and are cached in-process for a configurable TTL.

use moka::future::Cache;
use modelguard_core::{Artifact, ArtifactId, ConfusionAssessment, ConfusionPolicy, TrustSignals};
use modelguard_db::{ArtifactStore, Partition};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::discovery::PopularityProvider;
use crate::error::{ServiceError, ServiceResult};
use crate::locks::ArtifactLocks;

/// Confusion checks over catalog artifacts
pub struct PackageConfusionService {
    store: Arc<dyn ArtifactStore>,
    popularity: Arc<dyn PopularityProvider>,
    policy: ConfusionPolicy,
    limit: usize,
    locks: ArtifactLocks,
    popular: Cache<usize, Arc<Vec<String>>>,
}

impl PackageConfusionService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        popularity: Arc<dyn PopularityProvider>,
        policy: ConfusionPolicy,
        limit: usize,
        ttl: Duration,
        locks: ArtifactLocks,
    ) -> Self {
        let popular = Cache::builder().max_capacity(4).time_to_live(ttl).build();
        Self {
            store,
            popularity,
            policy,
            limit,
            locks,
            popular,
        }
    }

    /// Current popular names, fetched at most once per TTL
    pub async fn popular_names(&self) -> ServiceResult<Arc<Vec<String>>> {
        let popularity = self.popularity.clone();
        let limit = self.limit;
        self.popular
            .try_get_with(limit, async move {
                let names = popularity.popular_names(limit).await?;
                debug!(count = names.len(), "Fetched popular names");
                Ok::<_, ServiceError>(Arc::new(names))
            })
            .await
            .map_err(|e| ServiceError::Collaborator(format!("Popular names unavailable: {}", e)))
    }

    /// Full assessment of one artifact's name and trust signals
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id()))]
    pub async fn assess(&self, artifact: &Artifact) -> ServiceResult<ConfusionAssessment> {
        let popular = self.popular_names().await?;
        let signals = TrustSignals::from_metadata(&artifact.base().metadata);
        let assessment = self.policy.assess(artifact.name(), &signals, popular.as_slice());
        debug!(
            similarity = assessment.similarity,
            best_match = ?assessment.best_match,
            low_trust = assessment.low_trust,
            suspected = assessment.suspected,
            "Confusion assessment"
        );
        Ok(assessment)
    }

    /// Whether the artifact looks like it impersonates a popular one.
    /// Always false for canonical artifacts.
    pub async fn is_suspected_package_confusion(&self, artifact: &Artifact) -> ServiceResult<bool> {
        Ok(self.assess(artifact).await?.suspected)
    }

    /// Assess every catalog model and persist changed flags; returns the
    /// suspected ids
    #[instrument(skip(self))]
    pub async fn flag_catalog(&self) -> ServiceResult<Vec<ArtifactId>> {
        let mut suspected = Vec::new();

        for artifact in self.store.scan(Partition::Catalog).await? {
            let Some(model) = artifact.as_model() else {
                continue;
            };
            let flagged = self.assess(&artifact).await?.suspected;
            if flagged {
                suspected.push(model.id());
            }
            if flagged == model.suspected_package_confusion {
                continue;
            }

            let _guard = self.locks.acquire(model.id()).await;
            let Some(Artifact::Model(mut current)) =
                self.store.get(Partition::Catalog, &model.id()).await?
            else {
                warn!(artifact_id = %model.id(), "Model left the catalog during flagging");
                continue;
            };
            current.suspected_package_confusion = flagged;
            current.base.touch();
            self.store.put(Partition::Catalog, &Artifact::Model(current)).await?;
            info!(artifact_id = %model.id(), suspected = flagged, "Updated package-confusion flag");
        }

        Ok(suspected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{MockPopularityProvider, StaticPopularity};
    use chrono::{Duration as ChronoDuration, Utc};
    use modelguard_core::ModelArtifact;
    use modelguard_db::InMemoryArtifactStore;

    fn service_with(store: Arc<InMemoryArtifactStore>, popularity: Arc<dyn PopularityProvider>) -> PackageConfusionService {
        PackageConfusionService::new(
            store,
            popularity,
            ConfusionPolicy::default(),
            500,
            Duration::from_secs(3600),
            ArtifactLocks::new(),
        )
    }

    fn service(store: Arc<InMemoryArtifactStore>) -> PackageConfusionService {
        service_with(
            store,
            Arc::new(StaticPopularity::new(["bert-base-uncased", "gpt2", "openai/whisper-large"])),
        )
    }

    fn model(name: &str, downloads: u64, age_days: i64) -> Artifact {
        let created = (Utc::now() - ChronoDuration::days(age_days)).to_rfc3339();
        Artifact::from(
            ModelArtifact::builder(name, format!("https://hf.co/{}", name))
                .metadata_entry("downloads", downloads)
                .metadata_entry("likes", 3)
                .metadata_entry("created_at", created)
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_canonical_name_is_never_suspected() {
        let svc = service(Arc::new(InMemoryArtifactStore::new()));
        let artifact = model("BERT-base-uncased", 0, 1);
        assert!(!svc.is_suspected_package_confusion(&artifact).await.unwrap());
        assert!(svc.assess(&artifact).await.unwrap().canonical);
    }

    #[tokio::test]
    async fn test_young_near_duplicate_is_suspected() {
        let svc = service(Arc::new(InMemoryArtifactStore::new()));
        let artifact = model("bert-base-uncassed", 50, 2);
        let assessment = svc.assess(&artifact).await.unwrap();
        assert_eq!(assessment.best_match.as_deref(), Some("bert-base-uncased"));
        assert!(assessment.similarity > 0.8);
        assert!(assessment.suspected);
    }

    #[tokio::test]
    async fn test_dissimilar_name_is_not_suspected() {
        let svc = service(Arc::new(InMemoryArtifactStore::new()));
        let artifact = model("resnet50-food101", 10, 1);
        assert!(!svc.is_suspected_package_confusion(&artifact).await.unwrap());
    }

    #[tokio::test]
    async fn test_popular_names_are_cached() {
        let mut popularity = MockPopularityProvider::new();
        popularity
            .expect_popular_names()
            .times(1)
            .returning(|_| Ok(vec!["gpt2".to_string()]));
        let svc = service_with(Arc::new(InMemoryArtifactStore::new()), Arc::new(popularity));

        let artifact = model("gpt-2", 10, 1);
        svc.assess(&artifact).await.unwrap();
        svc.assess(&artifact).await.unwrap();
    }

    #[tokio::test]
    async fn test_popularity_failure_surfaces() {
        let mut popularity = MockPopularityProvider::new();
        popularity
            .expect_popular_names()
            .returning(|_| Err(ServiceError::Collaborator("hub offline".to_string())));
        let svc = service_with(Arc::new(InMemoryArtifactStore::new()), Arc::new(popularity));

        let err = svc.assess(&model("gpt-2", 10, 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Collaborator(_)));
    }

    #[tokio::test]
    async fn test_flag_catalog_persists_flags() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let squatter = model("bert-base-uncassed", 50, 2);
        let honest = model("distilroberta-sentiment", 50, 2);
        let stale = {
            let mut m = model("llama-finetune", 50, 2);
            if let Some(m) = m.as_model_mut() {
                m.suspected_package_confusion = true;
            }
            m
        };
        for a in [&squatter, &honest, &stale] {
            store.put(Partition::Catalog, a).await.unwrap();
        }

        let svc = service(store.clone());
        let suspected = svc.flag_catalog().await.unwrap();
        assert_eq!(suspected, vec![squatter.id()]);

        let flag = |a: Artifact| a.as_model().unwrap().suspected_package_confusion;
        let get = |id| {
            let store = store.clone();
            async move { store.get(Partition::Catalog, &id).await.unwrap().unwrap() }
        };
        assert!(flag(get(squatter.id()).await));
        assert!(!flag(get(honest.id()).await));
        assert!(!flag(get(stale.id()).await));
    }
}
