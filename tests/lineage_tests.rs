//! Lineage Integration Tests
//!
//! Parent links created through ingestion, in either arrival order, and the
//! resulting lineage views.

mod common;

use common::fixtures::{documented_dataset, documented_model, healthy_code};
use common::TestApp;
use modelguard_core::score::names;
use modelguard_core::{ArtifactId, ModelArtifact, Relationship, ScoreValue};
use modelguard_db::Partition;
use modelguard_service::ServiceError;

fn derived(name: &str, parent: &str) -> ModelArtifact {
    documented_model(name)
        .code_name("acme/trainer")
        .dataset_name("squad")
        .parent_model_name(parent)
        .parent_model_relationship("fine-tuned")
        .build()
        .unwrap()
}

fn root(name: &str) -> ModelArtifact {
    documented_model(name)
        .code_name("acme/trainer")
        .dataset_name("squad")
        .build()
        .unwrap()
}

async fn app_with_counterparts() -> TestApp {
    let app = TestApp::new();
    app.ingest(healthy_code("acme/trainer")).await;
    app.ingest(documented_dataset("squad")).await;
    app
}

fn node_ids(graph: &modelguard_core::LineageGraph) -> Vec<ArtifactId> {
    graph.nodes.iter().map(|n| n.artifact_id).collect()
}

#[tokio::test]
async fn test_chain_ingested_parent_first() {
    let app = app_with_counterparts().await;
    let base = app.ingest(root("bert-base")).await.artifact.id();
    let tuned = app.ingest(derived("bert-squad", "bert-base")).await;
    let tuned_id = tuned.artifact.id();
    let v2 = app.ingest(derived("bert-squad-v2", "bert-squad")).await.artifact.id();

    assert!(tuned
        .edges
        .iter()
        .any(|e| e.relationship == Relationship::ParentModel && e.to_id == base));

    let (_, base_model) = app.model(base).await;
    assert!(base_model.child_model_ids.contains(&tuned_id));

    // Full ancestry from the leaf
    let graph = app.services.lineage.build_lineage(&v2).await.unwrap();
    assert_eq!(node_ids(&graph), vec![v2, tuned_id, base]);
    assert_eq!(graph.edges.len(), 2);
    assert!(graph
        .edges
        .iter()
        .all(|e| e.relationship.as_deref() == Some("fine-tuned")));

    // Children are one hop only
    let graph = app.services.lineage.build_lineage(&base).await.unwrap();
    assert_eq!(node_ids(&graph), vec![base, tuned_id]);
    assert!(!graph.contains(&v2));

    let graph = app.services.lineage.build_lineage(&tuned_id).await.unwrap();
    assert_eq!(node_ids(&graph), vec![tuned_id, base, v2]);
}

#[tokio::test]
async fn test_parent_arriving_later_adopts_child() {
    let app = app_with_counterparts().await;
    let child = app.ingest(derived("bert-squad", "bert-base")).await;
    let child_id = child.artifact.id();
    assert_eq!(child.partition, Partition::Catalog);
    let (_, before) = app.model(child_id).await;
    assert_eq!(before.parent_model_id, None);

    let parent = app.ingest(root("bert-base")).await;
    let parent_id = parent.artifact.id();
    assert!(parent
        .edges
        .iter()
        .any(|e| e.from_id == child_id && e.to_id == parent_id));

    let (_, after) = app.model(child_id).await;
    assert_eq!(after.parent_model_id, Some(parent_id));

    // The child's treescore now reflects its parent's NetScore
    let (_, parent_model) = app.model(parent_id).await;
    assert_eq!(
        after.scores.get(names::TREESCORE),
        Some(&ScoreValue::Scalar(parent_model.net_score().unwrap()))
    );

    let graph = app.services.lineage.build_lineage(&child_id).await.unwrap();
    assert_eq!(node_ids(&graph), vec![child_id, parent_id]);
    let graph = app.services.lineage.build_lineage(&parent_id).await.unwrap();
    assert_eq!(node_ids(&graph), vec![parent_id, child_id]);
}

#[tokio::test]
async fn test_lineage_errors() {
    let app = TestApp::new();
    let code = app.ingest(healthy_code("acme/trainer")).await;

    assert!(matches!(
        app.services.lineage.build_lineage(&ArtifactId::new()).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        app.services.lineage.build_lineage(&code.artifact.id()).await,
        Err(ServiceError::InvalidInput(_))
    ));
}
