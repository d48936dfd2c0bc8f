//! Artifact types held by the catalog
//!
//! The catalog holds three kinds of artifact. Models carry scores and lineage
//! links; code and dataset artifacts are the targets of those links. The kind
//! of an artifact is the variant of [`Artifact`] and cannot change once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::connection::{DiscoveredReferences, LinkOutcome};
use crate::error::{RegistryError, Result};
use crate::score::{LatencyMap, ScoreCard, ScoreMap, ScoreValue, NET_SCORE};
use crate::types::{ArtifactId, ArtifactKind, Metadata};

/// Fields shared by every artifact kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBase {
    /// Unique identifier, assigned once
    pub id: ArtifactId,

    /// Human-readable name, used for connection matching
    pub name: String,

    /// Where the artifact was ingested from
    #[serde(default)]
    pub source_url: String,

    /// Key of the artifact's content in the blob store
    pub storage_key: String,

    /// Open metadata (popularity signals, documentation excerpts, ...)
    #[serde(default)]
    pub metadata: Metadata,

    /// Timestamp when the artifact was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the artifact was last updated
    pub updated_at: DateTime<Utc>,
}

impl ArtifactBase {
    fn new(kind: ArtifactKind, name: impl Into<String>, source_url: impl Into<String>) -> Self {
        let id = ArtifactId::new();
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            source_url: source_url.into(),
            storage_key: default_storage_key(kind, &id),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the shared fields
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::ValidationError(
                "Artifact name cannot be empty".to_string(),
            ));
        }
        if self.storage_key.is_empty() {
            return Err(RegistryError::ValidationError(
                "Storage key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a numeric metadata field, accepting integers, floats and numeric strings
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read a string metadata field
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Read a boolean metadata field
    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    /// Mark the record as modified
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Storage key used when none is supplied: `"{kind}s/{id}"`
pub fn default_storage_key(kind: ArtifactKind, id: &ArtifactId) -> String {
    format!("{}s/{}", kind.as_str(), id)
}

/// A trained model, scored and linked into the lineage graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(flatten)]
    pub base: ArtifactBase,

    /// Size of the model weights in bytes
    #[serde(default)]
    pub size_bytes: u64,

    /// License identifier, normalized to lowercase
    #[serde(default = "unknown_license")]
    pub license: String,

    /// Metric scores, including `NetScore`
    #[serde(default)]
    pub scores: ScoreMap,

    /// Metric latencies in milliseconds
    #[serde(default)]
    pub scores_latency: LatencyMap,

    /// Name of the code repository this model references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,

    /// Name of the dataset this model references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,

    /// Name of the model this one was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_model_name: Option<String>,

    /// Linked code artifact; set at most once
    #[serde(default)]
    pub code_artifact_id: Option<ArtifactId>,

    /// Linked dataset artifact; set at most once
    #[serde(default)]
    pub dataset_artifact_id: Option<ArtifactId>,

    /// Linked parent model; set at most once
    #[serde(default)]
    pub parent_model_id: Option<ArtifactId>,

    /// Where the parent reference was discovered (e.g. `config_json`)
    #[serde(default)]
    pub parent_model_source: Option<String>,

    /// How this model relates to its parent (e.g. `fine-tuned`)
    #[serde(default)]
    pub parent_model_relationship: Option<String>,

    /// Models that name this one as their parent
    #[serde(default)]
    pub child_model_ids: BTreeSet<ArtifactId>,

    /// Set by the package-confusion detector
    #[serde(default)]
    pub suspected_package_confusion: bool,
}

fn unknown_license() -> String {
    "unknown".to_string()
}

impl ModelArtifact {
    /// Create a builder for a model artifact
    pub fn builder(name: impl Into<String>, source_url: impl Into<String>) -> ModelArtifactBuilder {
        ModelArtifactBuilder::new(name, source_url)
    }

    /// Artifact id
    pub fn id(&self) -> ArtifactId {
        self.base.id
    }

    /// Artifact name
    pub fn name(&self) -> &str {
        &self.base.name
    }

    /// Stored NetScore, if present and scalar
    pub fn net_score(&self) -> Option<f64> {
        self.scores.get(NET_SCORE).and_then(ScoreValue::as_scalar)
    }

    /// Replace scores and latencies with a fresh score card
    pub fn apply_score_card(&mut self, card: ScoreCard) {
        self.scores = card.scores;
        self.scores_latency = card.latencies;
        self.base.touch();
    }

    /// Merge a partial score card over the existing maps
    pub fn merge_score_card(&mut self, card: ScoreCard) {
        self.scores.extend(card.scores);
        self.scores_latency.extend(card.latencies);
        self.base.touch();
    }

    /// The scores as a [`ScoreCard`]
    pub fn score_card(&self) -> ScoreCard {
        ScoreCard {
            scores: self.scores.clone(),
            latencies: self.scores_latency.clone(),
        }
    }

    /// Link the code artifact unless one is already linked
    pub fn link_code(&mut self, code_id: ArtifactId) -> LinkOutcome {
        link_once(&mut self.code_artifact_id, code_id)
    }

    /// Link the dataset artifact unless one is already linked
    pub fn link_dataset(&mut self, dataset_id: ArtifactId) -> LinkOutcome {
        link_once(&mut self.dataset_artifact_id, dataset_id)
    }

    /// Link the parent model unless one is already linked.
    ///
    /// Provenance is only recorded when the link is made; existing provenance
    /// is kept when already present.
    pub fn link_parent(
        &mut self,
        parent_id: ArtifactId,
        source: Option<String>,
        relationship: Option<String>,
    ) -> LinkOutcome {
        if parent_id == self.base.id {
            return LinkOutcome::Rejected;
        }
        let outcome = link_once(&mut self.parent_model_id, parent_id);
        if outcome.is_linked() {
            if self.parent_model_source.is_none() {
                self.parent_model_source = source;
            }
            if self.parent_model_relationship.is_none() {
                self.parent_model_relationship = relationship;
            }
        }
        outcome
    }

    /// Record a direct child; returns false if it was already recorded
    pub fn add_child(&mut self, child_id: ArtifactId) -> bool {
        if child_id == self.base.id {
            return false;
        }
        self.child_model_ids.insert(child_id)
    }

    /// Reference names currently recorded on the model
    pub fn references(&self) -> DiscoveredReferences {
        DiscoveredReferences {
            code_name: self.code_name.clone(),
            dataset_name: self.dataset_name.clone(),
            parent_model_name: self.parent_model_name.clone(),
            parent_model_source: self.parent_model_source.clone(),
            parent_model_relationship: self.parent_model_relationship.clone(),
        }
    }

    /// Fill reference names that are not yet known; known values are kept
    pub fn absorb_references(&mut self, discovered: DiscoveredReferences) {
        let merged = self.references().merge(discovered);
        self.code_name = merged.code_name;
        self.dataset_name = merged.dataset_name;
        self.parent_model_name = merged.parent_model_name;
        self.parent_model_source = merged.parent_model_source;
        self.parent_model_relationship = merged.parent_model_relationship;
    }

    /// Validate the model
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.license.trim().is_empty() {
            return Err(RegistryError::ValidationError(
                "License cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn link_once(slot: &mut Option<ArtifactId>, id: ArtifactId) -> LinkOutcome {
    match slot {
        Some(existing) => LinkOutcome::AlreadyLinked(*existing),
        None => {
            *slot = Some(id);
            LinkOutcome::Linked
        }
    }
}

/// Builder for [`ModelArtifact`]
pub struct ModelArtifactBuilder {
    model: ModelArtifact,
}

impl ModelArtifactBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            model: ModelArtifact {
                base: ArtifactBase::new(ArtifactKind::Model, name, source_url),
                size_bytes: 0,
                license: unknown_license(),
                scores: ScoreMap::new(),
                scores_latency: LatencyMap::new(),
                code_name: None,
                dataset_name: None,
                parent_model_name: None,
                code_artifact_id: None,
                dataset_artifact_id: None,
                parent_model_id: None,
                parent_model_source: None,
                parent_model_relationship: None,
                child_model_ids: BTreeSet::new(),
                suspected_package_confusion: false,
            },
        }
    }

    /// Set the artifact id; the storage key follows unless set explicitly
    pub fn id(mut self, id: ArtifactId) -> Self {
        if self.model.base.storage_key == default_storage_key(ArtifactKind::Model, &self.model.base.id) {
            self.model.base.storage_key = default_storage_key(ArtifactKind::Model, &id);
        }
        self.model.base.id = id;
        self
    }

    /// Set the storage key
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.model.base.storage_key = key.into();
        self
    }

    /// Set the size in bytes
    pub fn size_bytes(mut self, size: u64) -> Self {
        self.model.size_bytes = size;
        self
    }

    /// Set the license
    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.model.license = license.into();
        self
    }

    /// Replace the metadata map
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.model.base.metadata = metadata;
        self
    }

    /// Insert a single metadata entry
    pub fn metadata_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.model.base.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the referenced code repository name
    pub fn code_name(mut self, name: impl Into<String>) -> Self {
        self.model.code_name = Some(name.into());
        self
    }

    /// Set the referenced dataset name
    pub fn dataset_name(mut self, name: impl Into<String>) -> Self {
        self.model.dataset_name = Some(name.into());
        self
    }

    /// Set the referenced parent model name
    pub fn parent_model_name(mut self, name: impl Into<String>) -> Self {
        self.model.parent_model_name = Some(name.into());
        self
    }

    /// Set the parent relationship description
    pub fn parent_model_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.model.parent_model_relationship = Some(relationship.into());
        self
    }

    /// Use pre-computed scores
    pub fn scores(mut self, card: ScoreCard) -> Self {
        self.model.scores = card.scores;
        self.model.scores_latency = card.latencies;
        self
    }

    /// Set the creation timestamp
    pub fn created_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.model.base.created_at = timestamp;
        self.model.base.updated_at = timestamp;
        self
    }

    /// Build the model with validation
    pub fn build(self) -> Result<ModelArtifact> {
        let mut model = self.build_unchecked();
        model.validate()?;
        model.license = model.license.trim().to_string();
        Ok(model)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> ModelArtifact {
        let mut model = self.model;
        model.license = model.license.to_lowercase();
        model
    }
}

/// A source code repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeArtifact {
    #[serde(flatten)]
    pub base: ArtifactBase,
}

impl CodeArtifact {
    /// Create a new code artifact
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            base: ArtifactBase::new(ArtifactKind::Code, name, source_url),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.base.metadata = metadata;
        self
    }
}

/// A training or evaluation dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetArtifact {
    #[serde(flatten)]
    pub base: ArtifactBase,
}

impl DatasetArtifact {
    /// Create a new dataset artifact
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            base: ArtifactBase::new(ArtifactKind::Dataset, name, source_url),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.base.metadata = metadata;
        self
    }
}

/// Any catalog artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Model(ModelArtifact),
    Dataset(DatasetArtifact),
    Code(CodeArtifact),
}

impl Artifact {
    /// Artifact kind
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Model(_) => ArtifactKind::Model,
            Artifact::Dataset(_) => ArtifactKind::Dataset,
            Artifact::Code(_) => ArtifactKind::Code,
        }
    }

    /// Shared fields
    pub fn base(&self) -> &ArtifactBase {
        match self {
            Artifact::Model(m) => &m.base,
            Artifact::Dataset(d) => &d.base,
            Artifact::Code(c) => &c.base,
        }
    }

    /// Mutable shared fields
    pub fn base_mut(&mut self) -> &mut ArtifactBase {
        match self {
            Artifact::Model(m) => &mut m.base,
            Artifact::Dataset(d) => &mut d.base,
            Artifact::Code(c) => &mut c.base,
        }
    }

    /// Artifact id
    pub fn id(&self) -> ArtifactId {
        self.base().id
    }

    /// Artifact name
    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// Blob store key
    pub fn storage_key(&self) -> &str {
        &self.base().storage_key
    }

    /// Borrow as a model
    pub fn as_model(&self) -> Option<&ModelArtifact> {
        match self {
            Artifact::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Mutably borrow as a model
    pub fn as_model_mut(&mut self) -> Option<&mut ModelArtifact> {
        match self {
            Artifact::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Take the model out of the enum
    pub fn into_model(self) -> Option<ModelArtifact> {
        match self {
            Artifact::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Validate the artifact
    pub fn validate(&self) -> Result<()> {
        match self {
            Artifact::Model(m) => m.validate(),
            other => other.base().validate(),
        }
    }

    /// Serialize to the record form persisted by the metadata store
    pub fn to_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild an artifact from a stored record
    pub fn from_record(record: Value) -> Result<Self> {
        Ok(serde_json::from_value(record)?)
    }

    /// Fail unless `other` has the same kind as `self`
    pub fn ensure_same_kind(&self, other: &Artifact) -> Result<()> {
        if self.kind() == other.kind() {
            Ok(())
        } else {
            Err(RegistryError::KindMismatch {
                expected: self.kind().to_string(),
                actual: other.kind().to_string(),
            })
        }
    }
}

impl From<ModelArtifact> for Artifact {
    fn from(model: ModelArtifact) -> Self {
        Artifact::Model(model)
    }
}

impl From<CodeArtifact> for Artifact {
    fn from(code: CodeArtifact) -> Self {
        Artifact::Code(code)
    }
}

impl From<DatasetArtifact> for Artifact {
    fn from(dataset: DatasetArtifact) -> Self {
        Artifact::Dataset(dataset)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Artifact({}, {}, {})", self.id(), self.name(), self.kind())
    }
}
