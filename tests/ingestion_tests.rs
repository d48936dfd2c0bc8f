//! Ingestion Integration Tests
//!
//! Full create flows: connection resolution, scoring, admission and
//! promotion of previously rejected models.

mod common;

use common::fixtures::{complete_model, documented_dataset, documented_model, healthy_code};
use common::{TableDiscovery, TestApp};
use modelguard_core::score::names;
use modelguard_core::{Artifact, DiscoveredReferences, Relationship, ScoreValue, NET_SCORE};
use modelguard_db::Partition;
use modelguard_service::ServiceError;

#[tokio::test]
async fn test_model_with_available_counterparts_is_admitted() {
    let app = TestApp::new();
    let code = app.ingest(healthy_code("acme/trainer")).await;
    let dataset = app.ingest(documented_dataset("squad")).await;

    let outcome = app
        .ingest(complete_model("acme/bert-qa", "acme/trainer", "squad"))
        .await;

    assert_eq!(outcome.partition, Partition::Catalog, "failing: {:?}", outcome.failing_metrics);
    assert!(outcome.failing_metrics.is_empty());
    assert_eq!(outcome.edges.len(), 2);

    let (partition, model) = app.model(outcome.artifact.id()).await;
    assert_eq!(partition, Partition::Catalog);
    assert_eq!(model.code_artifact_id, Some(code.artifact.id()));
    assert_eq!(model.dataset_artifact_id, Some(dataset.artifact.id()));
    assert!(model.net_score().unwrap() > 0.5);
    assert!(model.scores_latency.contains_key(NET_SCORE));
    assert_eq!(model.scores.len(), app.services.engine.registry().len() + 1);
}

#[tokio::test]
async fn test_reference_names_match_case_insensitively() {
    let app = TestApp::new();
    let code = app.ingest(healthy_code("acme/trainer")).await;

    let outcome = app
        .ingest(complete_model("acme/bert-qa", "ACME/Trainer", "squad"))
        .await;

    let (_, model) = app.model(outcome.artifact.id()).await;
    assert_eq!(model.code_artifact_id, Some(code.artifact.id()));
    assert_eq!(model.dataset_artifact_id, None);
}

#[tokio::test]
async fn test_rejected_model_is_promoted_when_counterparts_arrive() {
    let app = TestApp::new();
    let model = app
        .ingest(complete_model("acme/bert-qa", "acme/trainer", "squad"))
        .await;
    assert_eq!(model.partition, Partition::Rejected);
    assert!(model.failing_metrics.iter().any(|m| m == names::CODE_QUALITY));
    let id = model.artifact.id();

    app.ingest(documented_dataset("squad")).await;
    assert_eq!(app.partition_of(id).await, Some(Partition::Rejected));
    let (_, still_rejected) = app.model(id).await;
    assert!(still_rejected.dataset_artifact_id.is_some());

    let code = app.ingest(healthy_code("acme/trainer")).await;
    assert_eq!(code.edges.len(), 1);
    assert_eq!(code.edges[0].from_id, id);
    assert_eq!(code.edges[0].to_id, code.artifact.id());
    assert_eq!(code.edges[0].relationship, Relationship::Code);

    let (partition, promoted) = app.model(id).await;
    assert_eq!(partition, Partition::Catalog);
    assert_eq!(
        promoted.scores.get(names::CODE_QUALITY),
        Some(&ScoreValue::Scalar(1.0))
    );
    assert!(app
        .services
        .gate
        .scores_below_threshold(&promoted)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_discovery_fills_missing_references() {
    let app = TestApp::builder()
        .discovery(TableDiscovery(vec![(
            "acme/qa".to_string(),
            DiscoveredReferences {
                code_name: Some("acme/trainer".to_string()),
                dataset_name: Some("squad".to_string()),
                ..Default::default()
            },
        )]))
        .build();
    app.ingest(healthy_code("acme/trainer")).await;
    app.ingest(documented_dataset("squad")).await;

    let outcome = app
        .ingest(documented_model("acme/qa").build().unwrap())
        .await;

    assert_eq!(outcome.partition, Partition::Catalog);
    let (_, model) = app.model(outcome.artifact.id()).await;
    assert_eq!(model.code_name.as_deref(), Some("acme/trainer"));
    assert!(model.code_artifact_id.is_some());
    assert!(model.dataset_artifact_id.is_some());
}

#[tokio::test]
async fn test_user_supplied_names_win_over_discovery() {
    let app = TestApp::builder()
        .discovery(TableDiscovery(vec![(
            "acme/qa".to_string(),
            DiscoveredReferences {
                code_name: Some("someone/else".to_string()),
                ..Default::default()
            },
        )]))
        .build();
    let code = app.ingest(healthy_code("acme/trainer")).await;
    app.ingest(healthy_code("someone/else")).await;

    let outcome = app
        .ingest(
            documented_model("acme/qa")
                .code_name("acme/trainer")
                .build()
                .unwrap(),
        )
        .await;

    let (_, model) = app.model(outcome.artifact.id()).await;
    assert_eq!(model.code_name.as_deref(), Some("acme/trainer"));
    assert_eq!(model.code_artifact_id, Some(code.artifact.id()));
}

#[tokio::test]
async fn test_duplicate_ingest_is_rejected() {
    let app = TestApp::new();
    let code = app.ingest(healthy_code("acme/trainer")).await;

    let err = app
        .services
        .ingestion
        .ingest(code.artifact.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_repeat_resolution_creates_no_edges() {
    let app = TestApp::new();
    app.ingest(healthy_code("acme/trainer")).await;
    let outcome = app
        .ingest(complete_model("acme/bert-qa", "acme/trainer", "squad"))
        .await;

    let (_, model) = app.model(outcome.artifact.id()).await;
    let mut artifact = Artifact::from(model);
    let edges = app
        .services
        .resolver
        .resolve_connections(&mut artifact)
        .await
        .unwrap();
    assert!(edges.is_empty());
}
