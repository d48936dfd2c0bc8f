//! Test fixtures
//!
//! Metadata here is tuned so that a model clears every metric once both its
//! code and dataset are linked, and fails the gate while either is missing.

use chrono::{Duration, Utc};
use modelguard_core::{
    CodeArtifact, DatasetArtifact, Metadata, ModelArtifact, ModelArtifactBuilder,
};
use serde_json::{json, Value};

pub fn metadata(value: Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

/// A well documented model with no links yet
pub fn documented_model(name: &str) -> ModelArtifactBuilder {
    let readme = format!(
        "Fine-tuned checkpoint reaching 91% F1 on the evaluation split. {}",
        "usage ".repeat(300)
    );
    ModelArtifact::builder(name, format!("https://huggingface.co/{}", name))
        .license("Apache-2.0")
        .size_bytes(400 * 1024 * 1024)
        .metadata_entry("readme", readme)
        .metadata_entry("has_examples", true)
        .metadata_entry("benchmarks", json!([{"task": "squad"}, {"task": "mnli"}]))
}

/// A model that links its code and dataset and should land in the catalog
pub fn complete_model(name: &str, code: &str, dataset: &str) -> ModelArtifact {
    documented_model(name)
        .code_name(code)
        .dataset_name(dataset)
        .build()
        .expect("Invalid model fixture")
}

/// A bare model with a restrictive license and no documentation
pub fn weak_model(name: &str) -> ModelArtifact {
    ModelArtifact::builder(name, format!("https://huggingface.co/{}", name))
        .license("cc-by-nc-4.0")
        .build()
        .expect("Invalid model fixture")
}

/// A model name-squatting on a popular one
pub fn squatting_model(name: &str) -> ModelArtifact {
    let created = (Utc::now() - Duration::days(3)).to_rfc3339();
    ModelArtifact::builder(name, format!("https://huggingface.co/{}", name))
        .metadata_entry("downloads", 40)
        .metadata_entry("likes", 1)
        .metadata_entry("created_at", created)
        .build()
        .expect("Invalid model fixture")
}

pub fn healthy_code(name: &str) -> CodeArtifact {
    CodeArtifact::new(name, format!("https://github.com/{}", name)).with_metadata(metadata(json!({
        "has_tests": true,
        "has_ci": true,
        "has_lint": true,
        "contributors": 12,
        "reviewed_fraction": 0.75,
    })))
}

pub fn documented_dataset(name: &str) -> DatasetArtifact {
    DatasetArtifact::new(name, format!("https://huggingface.co/datasets/{}", name)).with_metadata(
        metadata(json!({
            "description": "Reading comprehension pairs",
            "license": "cc-by-4.0",
            "downloads": 2500,
        })),
    )
}
