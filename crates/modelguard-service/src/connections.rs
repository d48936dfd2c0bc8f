//! Connection resolver
//!
//! Links models to the code, datasets and parent models they reference, and
//! links newly arriving code and datasets back to the models waiting for them.
//! A link field is written at most once; later resolutions never overwrite it.

use modelguard_core::{
    Artifact, ArtifactId, ArtifactKind, ConnectionEdge, LinkOutcome, ModelArtifact, Relationship,
    NET_SCORE,
};
use modelguard_db::{ArtifactStore, Partition};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::discovery::Discovery;
use crate::error::ServiceResult;
use crate::gate::QualityGate;
use crate::locks::ArtifactLocks;
use crate::metrics::MetricSubset;
use crate::scoring::ScoreEngine;

/// Subset recomputed when a link of this kind is made
fn rescore_subset(relationship: Relationship) -> MetricSubset {
    match relationship {
        Relationship::Code => MetricSubset::CodeRelevant,
        Relationship::Dataset => MetricSubset::DatasetRelevant,
        Relationship::ParentModel => MetricSubset::LineageRelevant,
    }
}

fn link(model: &mut ModelArtifact, relationship: Relationship, target: ArtifactId) -> LinkOutcome {
    match relationship {
        Relationship::Code => model.link_code(target),
        Relationship::Dataset => model.link_dataset(target),
        Relationship::ParentModel => model.link_parent(target, None, None),
    }
}

/// Resolves and persists links between artifacts
pub struct ConnectionResolver {
    store: Arc<dyn ArtifactStore>,
    discovery: Arc<dyn Discovery>,
    engine: Arc<ScoreEngine>,
    gate: Arc<QualityGate>,
    locks: ArtifactLocks,
}

impl ConnectionResolver {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        discovery: Arc<dyn Discovery>,
        engine: Arc<ScoreEngine>,
        gate: Arc<QualityGate>,
        locks: ArtifactLocks,
    ) -> Self {
        Self {
            store,
            discovery,
            engine,
            gate,
            locks,
        }
    }

    /// Resolve every connection of `artifact` and return the edges created.
    ///
    /// Models get their references linked and their waiting children adopted;
    /// if the model is already stored, the new links (and the scores
    /// recomputed for the affected subsets, when it already carries scores)
    /// are applied to the stored record and `artifact` is refreshed from it.
    /// Code and dataset artifacts are linked into the models naming them.
    /// Calling this again on the same artifact creates no new edges.
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id(), kind = %artifact.kind()))]
    pub async fn resolve_connections(&self, artifact: &mut Artifact) -> ServiceResult<Vec<ConnectionEdge>> {
        let edges = match artifact {
            Artifact::Model(model) => {
                let mut edges = self.link_references(model).await?;
                let mut rescored = Vec::new();
                if !model.scores.is_empty() && !edges.is_empty() {
                    for edge in &edges {
                        rescored.extend(
                            self.engine
                                .rescore(model, rescore_subset(edge.relationship))
                                .await,
                        );
                    }
                    rescored.push(NET_SCORE.to_string());
                }
                edges.extend(self.adopt_children(model).await?);
                if !edges.is_empty() {
                    self.persist_if_stored(model, &edges, &rescored).await?;
                }
                edges
            }
            Artifact::Code(_) | Artifact::Dataset(_) => self.link_dependents(artifact).await?,
        };

        debug!(edges = edges.len(), "Connections resolved");
        Ok(edges)
    }

    /// Fill in reference names via discovery and link the ones that resolve.
    ///
    /// Names already on the model win over discovered ones. Only catalog
    /// records are considered as link targets. A new parent link is also
    /// recorded on the parent's child set.
    #[instrument(skip(self, model), fields(artifact_id = %model.id()))]
    pub async fn link_references(&self, model: &mut ModelArtifact) -> ServiceResult<Vec<ConnectionEdge>> {
        let edges = self.resolve_references(model).await?;
        for edge in &edges {
            if edge.relationship == Relationship::ParentModel {
                self.record_children(edge.to_id, &[model.id()]).await?;
            }
        }
        Ok(edges)
    }

    /// Like [`link_references`](Self::link_references), but only sets the
    /// link ids on `model`. No other record is touched, so this is safe for
    /// a model whose id will not be the one stored.
    #[instrument(skip(self, model), fields(artifact_id = %model.id()))]
    pub async fn resolve_references(&self, model: &mut ModelArtifact) -> ServiceResult<Vec<ConnectionEdge>> {
        let unresolved = model.code_artifact_id.is_none()
            || model.dataset_artifact_id.is_none()
            || model.parent_model_id.is_none();
        if !unresolved {
            return Ok(Vec::new());
        }

        let discovered = self.discovery.discover(model).await;
        model.absorb_references(discovered);

        let mut edges = Vec::new();

        if model.code_artifact_id.is_none() {
            if let Some(name) = model.code_name.clone() {
                if let Some(code) = self.find_by_name(ArtifactKind::Code, &name, None).await? {
                    if model.link_code(code).is_linked() {
                        info!(code_id = %code, code_name = %name, "Linked code");
                        edges.push(ConnectionEdge::new(model.id(), code, Relationship::Code));
                    }
                }
            }
        }

        if model.dataset_artifact_id.is_none() {
            if let Some(name) = model.dataset_name.clone() {
                if let Some(dataset) = self.find_by_name(ArtifactKind::Dataset, &name, None).await? {
                    if model.link_dataset(dataset).is_linked() {
                        info!(dataset_id = %dataset, dataset_name = %name, "Linked dataset");
                        edges.push(ConnectionEdge::new(model.id(), dataset, Relationship::Dataset));
                    }
                }
            }
        }

        if model.parent_model_id.is_none() {
            if let Some(name) = model.parent_model_name.clone() {
                let parent = self
                    .find_by_name(ArtifactKind::Model, &name, Some(model.id()))
                    .await?;
                if let Some(parent) = parent {
                    let source = model.parent_model_source.clone();
                    let relationship = model.parent_model_relationship.clone();
                    if model.link_parent(parent, source, relationship).is_linked() {
                        info!(parent_id = %parent, parent_name = %name, "Linked parent model");
                        edges.push(
                            ConnectionEdge::new(model.id(), parent, Relationship::ParentModel)
                                .with_source(model.parent_model_source.clone()),
                        );
                    }
                }
            }
        }

        Ok(edges)
    }

    /// Link stored models that name `model` as their parent but have no
    /// parent yet. Each adopted child is rescored for lineage and persisted;
    /// rejected children that now pass the gate are promoted.
    #[instrument(skip(self, model), fields(artifact_id = %model.id()))]
    pub async fn adopt_children(&self, model: &mut ModelArtifact) -> ServiceResult<Vec<ConnectionEdge>> {
        let mut edges = Vec::new();

        for partition in Partition::ALL {
            let candidates = self
                .store
                .query_by_field(partition, Some(ArtifactKind::Model), "parent_model_name", model.name())
                .await?;

            for candidate in candidates {
                let child_id = candidate.id();
                let waiting = candidate
                    .as_model()
                    .is_some_and(|c| c.parent_model_id.is_none());
                if child_id == model.id() || !waiting {
                    continue;
                }

                let _guard = self.locks.acquire(child_id).await;
                let Some(mut child) = self.reload_model(partition, &child_id).await? else {
                    continue;
                };
                if !link(&mut child, Relationship::ParentModel, model.id()).is_linked() {
                    continue;
                }

                self.engine
                    .rescore(&mut child, MetricSubset::LineageRelevant)
                    .await;
                self.persist_linked(partition, &child).await?;

                model.add_child(child_id);
                info!(child_id = %child_id, "Adopted child model");
                edges.push(
                    ConnectionEdge::new(child_id, model.id(), Relationship::ParentModel)
                        .with_source(child.parent_model_source.clone()),
                );
            }
        }

        Ok(edges)
    }

    /// Link a code or dataset artifact into every stored model naming it
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id()))]
    pub async fn link_dependents(&self, artifact: &Artifact) -> ServiceResult<Vec<ConnectionEdge>> {
        let (field, relationship) = match artifact.kind() {
            ArtifactKind::Code => ("code_name", Relationship::Code),
            ArtifactKind::Dataset => ("dataset_name", Relationship::Dataset),
            ArtifactKind::Model => return Ok(Vec::new()),
        };
        let target = artifact.id();
        let mut edges = Vec::new();

        for partition in Partition::ALL {
            let candidates = self
                .store
                .query_by_field(partition, Some(ArtifactKind::Model), field, artifact.name())
                .await?;

            for candidate in candidates {
                let model_id = candidate.id();
                let _guard = self.locks.acquire(model_id).await;
                let Some(mut model) = self.reload_model(partition, &model_id).await? else {
                    continue;
                };
                match link(&mut model, relationship, target) {
                    LinkOutcome::Linked => {}
                    outcome => {
                        debug!(model_id = %model_id, ?outcome, "Model already linked");
                        continue;
                    }
                }

                self.engine
                    .rescore(&mut model, rescore_subset(relationship))
                    .await;
                self.persist_linked(partition, &model).await?;

                info!(model_id = %model_id, relationship = %relationship, "Linked waiting model");
                edges.push(ConnectionEdge::new(model_id, target, relationship));
            }
        }

        Ok(edges)
    }

    /// First catalog record of `kind` named `name`, ignoring case
    async fn find_by_name(
        &self,
        kind: ArtifactKind,
        name: &str,
        exclude: Option<ArtifactId>,
    ) -> ServiceResult<Option<ArtifactId>> {
        let matches = self
            .store
            .query_by_field(Partition::Catalog, Some(kind), "name", name)
            .await?;
        Ok(matches
            .iter()
            .map(Artifact::id)
            .find(|id| Some(*id) != exclude))
    }

    async fn reload_model(
        &self,
        partition: Partition,
        id: &ArtifactId,
    ) -> ServiceResult<Option<ModelArtifact>> {
        Ok(self
            .store
            .get(partition, id)
            .await?
            .and_then(Artifact::into_model))
    }

    /// Add `children` to the stored parent's child set.
    ///
    /// The parent is re-read under its lock and written back to the
    /// partition it currently lives in. Returns the parent as stored
    /// afterwards, or `None` if no model `parent_id` is stored.
    pub(crate) async fn record_children(
        &self,
        parent_id: ArtifactId,
        children: &[ArtifactId],
    ) -> ServiceResult<Option<(Partition, ModelArtifact)>> {
        let _guard = self.locks.acquire(parent_id).await;
        let Some((partition, artifact)) = self.store.locate(&parent_id).await? else {
            warn!(parent_id = %parent_id, "Parent vanished before its children could be recorded");
            return Ok(None);
        };
        let Some(mut parent) = artifact.into_model() else {
            return Ok(None);
        };

        let mut changed = false;
        for child in children {
            changed |= parent.add_child(*child);
        }
        if changed {
            parent.base.touch();
            self.store
                .put(partition, &Artifact::Model(parent.clone()))
                .await?;
        }
        Ok(Some((partition, parent)))
    }

    /// Write back a model changed by linking. Caller holds the model's lock.
    async fn persist_linked(&self, partition: Partition, model: &ModelArtifact) -> ServiceResult<()> {
        if partition == Partition::Rejected && self.gate.passes(model)? {
            return self.gate.promote_held(model).await;
        }
        self.store
            .put(partition, &Artifact::Model(model.clone()))
            .await?;
        Ok(())
    }

    /// Apply the links in `edges` and the `rescored` keys of `model` to the
    /// stored record, re-read under the model's lock, then refresh `model`
    /// from the result. Nothing happens if the model is not stored.
    async fn persist_if_stored(
        &self,
        model: &mut ModelArtifact,
        edges: &[ConnectionEdge],
        rescored: &[String],
    ) -> ServiceResult<()> {
        let id = model.id();
        let _guard = self.locks.acquire(id).await;
        let Some((partition, Artifact::Model(mut current))) = self.store.locate(&id).await? else {
            return Ok(());
        };

        current.absorb_references(model.references());
        for edge in edges {
            if edge.from_id == id {
                let outcome = match edge.relationship {
                    Relationship::ParentModel => current.link_parent(
                        edge.to_id,
                        model.parent_model_source.clone(),
                        model.parent_model_relationship.clone(),
                    ),
                    relationship => link(&mut current, relationship, edge.to_id),
                };
                if let LinkOutcome::AlreadyLinked(existing) = outcome {
                    if existing != edge.to_id {
                        warn!(
                            relationship = %edge.relationship,
                            existing = %existing,
                            "Stored record was linked concurrently"
                        );
                    }
                }
            } else if edge.to_id == id {
                current.add_child(edge.from_id);
            }
        }

        for key in rescored {
            if let Some(score) = model.scores.get(key) {
                current.scores.insert(key.clone(), score.clone());
            }
            if let Some(latency) = model.scores_latency.get(key) {
                current.scores_latency.insert(key.clone(), *latency);
            }
        }
        current.base.touch();

        self.persist_linked(partition, &current).await?;
        *model = current;
        Ok(())
    }
}
