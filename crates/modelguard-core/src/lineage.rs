//! Lineage graph types

use serde::{Deserialize, Serialize};

use crate::artifact::ModelArtifact;
use crate::types::ArtifactId;

/// A model in a lineage view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    pub artifact_id: ArtifactId,
    pub name: String,
    /// Where the model came from
    pub source: String,
}

impl From<&ModelArtifact> for LineageNode {
    fn from(model: &ModelArtifact) -> Self {
        Self {
            artifact_id: model.id(),
            name: model.name().to_string(),
            source: model.base.source_url.clone(),
        }
    }
}

/// A directed parent → child edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub from: ArtifactId,
    pub to: ArtifactId,
    /// Relationship recorded on the child, e.g. `fine-tuned`
    pub relationship: Option<String>,
    /// Where the parent reference was discovered
    pub provenance: Option<String>,
}

/// Ancestor chain plus direct children of a model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageGraph {
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
}

impl LineageGraph {
    /// Start a graph holding only the root
    pub fn with_root(root: &ModelArtifact) -> Self {
        Self {
            nodes: vec![LineageNode::from(root)],
            edges: Vec::new(),
        }
    }

    /// Append a parent of `child`; the edge points parent → child
    pub fn push_parent(&mut self, parent: &ModelArtifact, child: &ModelArtifact) {
        self.push_node(parent);
        self.edges.push(LineageEdge {
            from: parent.id(),
            to: child.id(),
            relationship: child.parent_model_relationship.clone(),
            provenance: child.parent_model_source.clone(),
        });
    }

    /// Append a direct child of `model`
    pub fn push_child(&mut self, model: &ModelArtifact, child: &ModelArtifact) {
        self.push_node(child);
        self.edges.push(LineageEdge {
            from: model.id(),
            to: child.id(),
            relationship: child.parent_model_relationship.clone(),
            provenance: child.parent_model_source.clone(),
        });
    }

    fn push_node(&mut self, model: &ModelArtifact) {
        if !self.contains(&model.id()) {
            self.nodes.push(LineageNode::from(model));
        }
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.nodes.iter().any(|n| &n.artifact_id == id)
    }
}
