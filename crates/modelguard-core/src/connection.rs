//! Connection edges between models and their counterparts

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ArtifactId, ArtifactKind};

/// Kind of link a model can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Model → code repository
    Code,
    /// Model → dataset
    Dataset,
    /// Child model → parent model
    ParentModel,
}

impl Relationship {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Code => "code",
            Relationship::Dataset => "dataset",
            Relationship::ParentModel => "parent_model",
        }
    }

    /// Kind of artifact on the far end of the link
    pub fn target_kind(&self) -> ArtifactKind {
        match self {
            Relationship::Code => ArtifactKind::Code,
            Relationship::Dataset => ArtifactKind::Dataset,
            Relationship::ParentModel => ArtifactKind::Model,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A link created by the connection resolver.
///
/// Edges are not persisted on their own; the link fields of the model are the
/// source of truth. At most one edge exists per (model, relationship) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEdge {
    /// The model holding the link
    pub from_id: ArtifactId,
    /// The linked counterpart
    pub to_id: ArtifactId,
    pub relationship: Relationship,
    /// How the reference name was obtained
    pub discovered_source: Option<String>,
}

impl ConnectionEdge {
    pub fn new(from_id: ArtifactId, to_id: ArtifactId, relationship: Relationship) -> Self {
        Self {
            from_id,
            to_id,
            relationship,
            discovered_source: None,
        }
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.discovered_source = source;
        self
    }
}

/// Result of trying to set a link field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The field was empty and now holds the new id
    Linked,
    /// The field already held a link; the existing id is kept
    AlreadyLinked(ArtifactId),
    /// The link would point the model at itself
    Rejected,
}

impl LinkOutcome {
    pub fn is_linked(&self) -> bool {
        matches!(self, LinkOutcome::Linked)
    }
}

/// Reference names extracted from a model's content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredReferences {
    pub code_name: Option<String>,
    pub dataset_name: Option<String>,
    pub parent_model_name: Option<String>,
    pub parent_model_source: Option<String>,
    pub parent_model_relationship: Option<String>,
}

impl DiscoveredReferences {
    /// Field names asked of the classifier
    pub const FIELDS: [&'static str; 5] = [
        "code_name",
        "dataset_name",
        "parent_model_name",
        "parent_model_source",
        "parent_model_relationship",
    ];

    /// True when nothing was discovered
    pub fn is_empty(&self) -> bool {
        self.code_name.is_none()
            && self.dataset_name.is_none()
            && self.parent_model_name.is_none()
            && self.parent_model_source.is_none()
            && self.parent_model_relationship.is_none()
    }

    /// Build from a classifier's field map; blank values count as missing
    pub fn from_fields<'a>(mut lookup: impl FnMut(&str) -> Option<&'a str>) -> Self {
        let mut field = |name: &str| {
            lookup(name)
                .map(str::trim)
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
                .map(str::to_string)
        };
        Self {
            code_name: field("code_name"),
            dataset_name: field("dataset_name"),
            parent_model_name: field("parent_model_name"),
            parent_model_source: field("parent_model_source"),
            parent_model_relationship: field("parent_model_relationship"),
        }
    }

    /// Merge `other` into `self`; values already known in `self` win
    pub fn merge(self, other: DiscoveredReferences) -> DiscoveredReferences {
        DiscoveredReferences {
            code_name: self.code_name.or(other.code_name),
            dataset_name: self.dataset_name.or(other.dataset_name),
            parent_model_name: self.parent_model_name.or(other.parent_model_name),
            parent_model_source: self.parent_model_source.or(other.parent_model_source),
            parent_model_relationship: self
                .parent_model_relationship
                .or(other.parent_model_relationship),
        }
    }
}
