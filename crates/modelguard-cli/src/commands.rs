//! Subcommand execution
//!
//! Every command prints a JSON document on stdout. Commands that change the
//! catalog report so through [`Command::is_mutating`]; the caller persists
//! the store afterwards.

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use modelguard_core::{Artifact, ArtifactId};
use modelguard_db::{
    ArtifactStore, CatalogSnapshot, InMemoryArtifactStore, Partition,
};
use modelguard_service::ServiceRegistry;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::submission::ArtifactSubmission;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ingest one artifact described by a JSON submission file
    Ingest {
        file: PathBuf,
    },

    /// Recompute and store the scores of a model
    Score {
        id: ArtifactId,
    },

    /// Print the lineage graph of a model
    Lineage {
        id: ArtifactId,
    },

    /// Arbitrate a candidate replacing a stored artifact
    Update {
        id: ArtifactId,
        candidate: PathBuf,
    },

    /// Assess one artifact, or flag the whole catalog when no id is given
    Confusion {
        id: Option<ArtifactId>,
    },

    /// Print the metric keys that keep a model out of the catalog
    Gate {
        id: ArtifactId,
    },
}

impl Command {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Ingest { .. }
                | Command::Score { .. }
                | Command::Update { .. }
                | Command::Confusion { id: None }
        )
    }
}

/// Run a command against the wired services
pub async fn execute(
    command: &Command,
    services: &ServiceRegistry,
    store: &dyn ArtifactStore,
) -> Result<Value> {
    match command {
        Command::Ingest { file } => {
            let artifact = read_submission(file).await?;
            let outcome = services.ingestion.ingest(artifact).await?;
            Ok(serde_json::to_value(&outcome)?)
        }
        Command::Score { id } => {
            let model = services.ingestion.rescore(id).await?;
            Ok(json!({
                "id": model.id(),
                "name": model.name(),
                "net_score": model.net_score(),
                "scores": model.scores,
                "scores_latency": model.scores_latency,
            }))
        }
        Command::Lineage { id } => {
            let graph = services.lineage.build_lineage(id).await?;
            Ok(serde_json::to_value(&graph)?)
        }
        Command::Update { id, candidate } => {
            let candidate = read_submission(candidate).await?;
            let decision = services.ingestion.update(id, candidate).await?;
            Ok(serde_json::to_value(&decision)?)
        }
        Command::Confusion { id: Some(id) } => {
            let (_, artifact) = locate(store, id).await?;
            let assessment = services.confusion.assess(&artifact).await?;
            Ok(serde_json::to_value(&assessment)?)
        }
        Command::Confusion { id: None } => {
            let suspected = services.confusion.flag_catalog().await?;
            info!(suspected = suspected.len(), "Catalog flagged");
            Ok(json!({ "suspected": suspected }))
        }
        Command::Gate { id } => {
            let (partition, artifact) = locate(store, id).await?;
            let model = artifact
                .as_model()
                .ok_or_else(|| anyhow!("{} is a {}, not a model", id, artifact.kind()))?;
            let failing = services.gate.scores_below_threshold(model)?;
            Ok(json!({
                "id": id,
                "partition": partition,
                "threshold": services.gate.threshold(),
                "passes": failing.is_empty(),
                "failing": failing,
            }))
        }
    }
}

async fn locate(store: &dyn ArtifactStore, id: &ArtifactId) -> Result<(Partition, Artifact)> {
    store
        .locate(id)
        .await?
        .ok_or_else(|| anyhow!("Artifact not found: {}", id))
}

async fn read_submission(path: &Path) -> Result<Artifact> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let submission: ArtifactSubmission = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid artifact submission in {}", path.display()))?;
    Ok(submission.into_artifact()?)
}

/// Load the JSON catalog file; a missing file is an empty catalog
pub async fn load_catalog(path: &Path) -> Result<InMemoryArtifactStore> {
    if !tokio::fs::try_exists(path).await? {
        debug!(path = %path.display(), "Catalog file absent, starting empty");
        return Ok(InMemoryArtifactStore::new());
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed catalog {}", path.display()))?;
    debug!(
        catalog = snapshot.catalog.len(),
        rejected = snapshot.rejected.len(),
        "Catalog loaded"
    );
    Ok(InMemoryArtifactStore::from_snapshot(snapshot))
}

/// Write both partitions back, replacing the file atomically
pub async fn save_catalog(store: &Arc<InMemoryArtifactStore>, path: &Path) -> Result<()> {
    let snapshot = store.snapshot().await;
    let body = serde_json::to_string_pretty(&snapshot)?;

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    tokio::fs::write(&staging, body)
        .await
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    tokio::fs::rename(&staging, path)
        .await
        .with_context(|| format!("Failed to replace catalog {}", path.display()))?;
    Ok(())
}

/// Fail early when a command needs a model that does not exist
pub fn ensure_catalog_present(path: &Path, command: &Command) -> Result<()> {
    if matches!(command, Command::Ingest { .. }) || path.exists() {
        return Ok(());
    }
    bail!("Catalog file {} does not exist; ingest an artifact first", path.display())
}
