//! Lineage queries
//!
//! The lineage view of a model is its full ancestor chain plus its direct
//! children. Descendants are deliberately limited to one hop.

use modelguard_core::{Artifact, ArtifactId, LineageGraph, ModelArtifact};
use modelguard_db::ArtifactStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{ServiceError, ServiceResult};

/// Builds lineage graphs from stored link fields
pub struct LineageService {
    store: Arc<dyn ArtifactStore>,
}

impl LineageService {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Lineage graph rooted at `model_id`
    ///
    /// # Errors
    ///
    /// `NotFound` if no artifact has this id, `InvalidInput` if it is not a model.
    #[instrument(skip(self), fields(artifact_id = %model_id))]
    pub async fn build_lineage(&self, model_id: &ArtifactId) -> ServiceResult<LineageGraph> {
        let root = match self.store.locate(model_id).await? {
            Some((_, Artifact::Model(model))) => model,
            Some((_, other)) => {
                return Err(ServiceError::InvalidInput(format!(
                    "Lineage is only defined for models, {} is a {}",
                    model_id,
                    other.kind()
                )))
            }
            None => return Err(ServiceError::NotFound(model_id.to_string())),
        };

        let mut graph = LineageGraph::with_root(&root);
        self.walk_ancestors(&root, &mut graph).await?;
        self.add_children(&root, &mut graph).await?;

        debug!(nodes = graph.nodes.len(), edges = graph.edges.len(), "Lineage built");
        Ok(graph)
    }

    async fn walk_ancestors(&self, root: &ModelArtifact, graph: &mut LineageGraph) -> ServiceResult<()> {
        let mut visited = HashSet::from([root.id()]);
        let mut current = root.clone();

        while let Some(parent_id) = current.parent_model_id {
            if !visited.insert(parent_id) {
                warn!(parent_id = %parent_id, "Cycle in parent chain, stopping");
                break;
            }
            let Some(parent) = self.load_model(&parent_id).await? else {
                warn!(parent_id = %parent_id, "Dangling parent reference, stopping");
                break;
            };
            graph.push_parent(&parent, &current);
            current = parent;
        }
        Ok(())
    }

    async fn add_children(&self, root: &ModelArtifact, graph: &mut LineageGraph) -> ServiceResult<()> {
        for child_id in &root.child_model_ids {
            match self.load_model(child_id).await? {
                Some(child) => graph.push_child(root, &child),
                None => debug!(child_id = %child_id, "Skipping dangling child reference"),
            }
        }
        Ok(())
    }

    async fn load_model(&self, id: &ArtifactId) -> ServiceResult<Option<ModelArtifact>> {
        Ok(self
            .store
            .locate(id)
            .await?
            .and_then(|(_, artifact)| artifact.into_model()))
    }
}
