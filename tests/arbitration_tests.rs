//! Update Arbitration Integration Tests
//!
//! Candidates go through linking and scoring before being compared with the
//! stored record; blobs of the losing side are discarded.

mod common;

use common::fixtures::{
    complete_model, documented_dataset, documented_model, healthy_code, metadata, weak_model,
};
use common::TestApp;
use modelguard_core::{Artifact, CodeArtifact};
use modelguard_db::Partition;
use modelguard_service::{ServiceError, UpdateDecision};
use serde_json::json;

async fn app_with_counterparts() -> TestApp {
    let app = TestApp::new();
    app.ingest(healthy_code("acme/trainer")).await;
    app.ingest(documented_dataset("squad")).await;
    app
}

#[tokio::test]
async fn test_better_candidate_supersedes_at_same_id() {
    let app = app_with_counterparts().await;
    let old = app
        .ingest(
            documented_model("acme/bert")
                .license("MPL-2.0")
                .code_name("acme/trainer")
                .dataset_name("squad")
                .build()
                .unwrap(),
        )
        .await;
    assert_eq!(old.partition, Partition::Catalog);
    let old_id = old.artifact.id();
    let old_key = old.artifact.storage_key().to_string();
    let (_, old_model) = app.model(old_id).await;

    let candidate = complete_model("acme/bert", "acme/trainer", "squad");
    let candidate_key = candidate.base.storage_key.clone();
    app.blobs.put(candidate_key.clone()).await;

    let decision = app
        .services
        .ingestion
        .update(&old_id, candidate.into())
        .await
        .unwrap();
    let UpdateDecision::Accepted { artifact } = decision else {
        panic!("expected the update to be accepted");
    };
    assert_eq!(artifact.id(), old_id);

    let (partition, stored) = app.model(old_id).await;
    assert_eq!(partition, Partition::Catalog);
    assert_eq!(stored.license, "apache-2.0");
    assert_eq!(stored.base.created_at, old_model.base.created_at);
    assert_eq!(stored.code_artifact_id, old_model.code_artifact_id);
    assert!(stored.net_score().unwrap() >= old_model.net_score().unwrap());

    assert!(!app.blobs.contains(&old_key).await);
    assert!(app.blobs.contains(&candidate_key).await);
}

#[tokio::test]
async fn test_worse_candidate_is_rejected_and_discarded() {
    let app = app_with_counterparts().await;
    let old = app
        .ingest(complete_model("acme/bert", "acme/trainer", "squad"))
        .await;
    let old_id = old.artifact.id();
    let (_, before) = app.model(old_id).await;

    let candidate = weak_model("acme/bert");
    let candidate_key = candidate.base.storage_key.clone();
    app.blobs.put(candidate_key.clone()).await;

    let decision = app
        .services
        .ingestion
        .update(&old_id, candidate.into())
        .await
        .unwrap();
    assert!(matches!(decision, UpdateDecision::Rejected { .. }));

    let (_, after) = app.model(old_id).await;
    assert_eq!(after, before);
    assert!(app.blobs.contains(old.artifact.storage_key()).await);
    assert!(!app.blobs.contains(&candidate_key).await);
}

#[tokio::test]
async fn test_code_updates_are_always_accepted() {
    let app = TestApp::new();
    let old = app.ingest(healthy_code("acme/trainer")).await;

    let candidate = CodeArtifact::new("acme/trainer", "https://github.com/acme/trainer-v2")
        .with_metadata(metadata(json!({"contributors": 1})));
    let candidate_key = candidate.base.storage_key.clone();
    app.blobs.put(candidate_key.clone()).await;

    let decision = app
        .services
        .ingestion
        .update(&old.artifact.id(), candidate.into())
        .await
        .unwrap();
    assert!(decision.is_accepted());

    let (partition, stored) = app
        .store_lookup(old.artifact.id())
        .await
        .expect("code artifact missing");
    assert_eq!(partition, Partition::Catalog);
    assert_eq!(stored.base().source_url, "https://github.com/acme/trainer-v2");
    assert!(!app.blobs.contains(old.artifact.storage_key()).await);
    assert!(app.blobs.contains(&candidate_key).await);
}

#[tokio::test]
async fn test_kind_change_is_refused() {
    let app = TestApp::new();
    let old = app.ingest(healthy_code("acme/trainer")).await;

    let candidate: Artifact = documented_dataset("acme/trainer").into();
    let err = app
        .services
        .ingestion
        .update(&old.artifact.id(), candidate)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn test_accepted_candidate_joins_parent_lineage_under_stored_id() {
    let app = app_with_counterparts().await;
    let parent = app
        .ingest(complete_model("bert-base", "acme/trainer", "squad"))
        .await;
    assert_eq!(parent.partition, Partition::Catalog);
    let parent_id = parent.artifact.id();
    let old = app.ingest(weak_model("acme/bert")).await;
    let old_id = old.artifact.id();

    let candidate = documented_model("acme/bert")
        .code_name("acme/trainer")
        .dataset_name("squad")
        .parent_model_name("bert-base")
        .parent_model_relationship("fine-tuned")
        .build()
        .unwrap();
    let candidate_id = candidate.id();
    let decision = app
        .services
        .ingestion
        .update(&old_id, candidate.into())
        .await
        .unwrap();
    assert!(decision.is_accepted());

    let graph = app.services.lineage.build_lineage(&parent_id).await.unwrap();
    assert!(graph.contains(&old_id));
    assert!(!graph.contains(&candidate_id));
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].from, parent_id);
    assert_eq!(graph.edges[0].to, old_id);
    assert_eq!(graph.edges[0].relationship.as_deref(), Some("fine-tuned"));

    let graph = app.services.lineage.build_lineage(&old_id).await.unwrap();
    assert!(graph.contains(&parent_id));
}
