//! Core domain models and types for ModelGuard
//!
//! This crate contains the artifact data structures, score maps and the pure
//! numeric logic (NetScore, threshold evaluation, name similarity) shared by
//! the persistence and service layers. It performs no I/O.

pub mod artifact;
pub mod confusion;
pub mod connection;
pub mod error;
pub mod lineage;
pub mod score;
pub mod types;

// Re-exports for convenience
pub use artifact::{
    default_storage_key, Artifact, ArtifactBase, CodeArtifact, DatasetArtifact, ModelArtifact,
    ModelArtifactBuilder,
};
pub use confusion::{
    is_canonical, similarity_ratio, ConfusionAssessment, ConfusionPolicy, DownloadBurst,
    TrustSignals,
};
pub use connection::{ConnectionEdge, DiscoveredReferences, LinkOutcome, Relationship};
pub use error::{RegistryError, Result};
pub use lineage::{LineageEdge, LineageGraph, LineageNode};
pub use score::{
    clamp01, net_score, scores_below_threshold, LatencyMap, MetricWeights, ScoreCard, ScoreMap,
    ScoreValue, NET_SCORE,
};
pub use types::{ArtifactId, ArtifactKind, Metadata};
