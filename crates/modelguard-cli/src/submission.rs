//! Artifact submissions read from JSON files
//!
//! A submission carries only what a client knows up front. The id, storage
//! key and timestamps are assigned when it is turned into an [`Artifact`].

use modelguard_core::{
    Artifact, ArtifactKind, CodeArtifact, DatasetArtifact, Metadata, ModelArtifact, RegistryError,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactSubmission {
    pub kind: ArtifactKind,
    pub name: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub storage_key: Option<String>,

    // Model-only fields
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub code_name: Option<String>,
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub parent_model_name: Option<String>,
    #[serde(default)]
    pub parent_model_relationship: Option<String>,
}

impl ArtifactSubmission {
    /// Build a fresh artifact with a new id
    ///
    /// # Errors
    ///
    /// Model-only fields on a code or dataset submission, or a model that
    /// fails validation.
    pub fn into_artifact(self) -> Result<Artifact, RegistryError> {
        match self.kind {
            ArtifactKind::Model => {
                let mut builder = ModelArtifact::builder(self.name, self.source_url)
                    .metadata(self.metadata);
                if let Some(key) = self.storage_key {
                    builder = builder.storage_key(key);
                }
                if let Some(size) = self.size_bytes {
                    builder = builder.size_bytes(size);
                }
                if let Some(license) = self.license {
                    builder = builder.license(license);
                }
                if let Some(name) = self.code_name {
                    builder = builder.code_name(name);
                }
                if let Some(name) = self.dataset_name {
                    builder = builder.dataset_name(name);
                }
                if let Some(name) = self.parent_model_name {
                    builder = builder.parent_model_name(name);
                }
                if let Some(relationship) = self.parent_model_relationship {
                    builder = builder.parent_model_relationship(relationship);
                }
                Ok(builder.build()?.into())
            }
            kind => {
                if self.has_model_fields() {
                    return Err(RegistryError::ValidationError(format!(
                        "A {} submission cannot carry model fields",
                        kind
                    )));
                }
                let mut artifact: Artifact = match kind {
                    ArtifactKind::Code => CodeArtifact::new(self.name, self.source_url)
                        .with_metadata(self.metadata)
                        .into(),
                    _ => DatasetArtifact::new(self.name, self.source_url)
                        .with_metadata(self.metadata)
                        .into(),
                };
                if let Some(key) = self.storage_key {
                    artifact.base_mut().storage_key = key;
                }
                artifact.validate()?;
                Ok(artifact)
            }
        }
    }

    fn has_model_fields(&self) -> bool {
        self.size_bytes.is_some()
            || self.license.is_some()
            || self.code_name.is_some()
            || self.dataset_name.is_some()
            || self.parent_model_name.is_some()
            || self.parent_model_relationship.is_some()
    }
}
