//! Built-in metrics
//!
//! Each metric reads artifact metadata (and, for some, linked artifacts from
//! the store) and maps it to `[0, 1]`. Absent evidence scores `0.0`; malformed
//! evidence is a [`MetricError`].

use async_trait::async_trait;
use modelguard_core::score::names;
use modelguard_core::{Artifact, ArtifactBase, ArtifactId, ModelArtifact, ScoreValue};
use modelguard_db::ArtifactStore;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{saturating_scale, Metric, MetricCategory};
use crate::error::MetricError;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Longest parent chain the treescore follows
const MAX_ANCESTRY_DEPTH: usize = 64;

/// Fetch a linked artifact; a dangling link is an error
async fn linked(
    store: &dyn ArtifactStore,
    id: Option<ArtifactId>,
) -> Result<Option<Artifact>, MetricError> {
    let Some(id) = id else {
        return Ok(None);
    };
    match store.locate(&id).await? {
        Some((_, artifact)) => Ok(Some(artifact)),
        None => Err(MetricError::MissingInput(format!(
            "linked artifact {} not found",
            id
        ))),
    }
}

fn flag(base: &ArtifactBase, key: &str) -> f64 {
    if base.metadata_bool(key).unwrap_or(false) {
        1.0
    } else {
        0.0
    }
}

fn word_count(base: &ArtifactBase, key: &str) -> usize {
    base.metadata_str(key)
        .map(|text| text.split_whitespace().count())
        .unwrap_or(0)
}

/// License compatibility
pub struct LicenseMetric;

impl LicenseMetric {
    pub fn new() -> Self {
        Self
    }

    /// Compatibility of a normalized license identifier
    pub fn compatibility(license: &str) -> f64 {
        let license = license.trim().to_lowercase();
        match license.as_str() {
            "mit" | "apache-2.0" | "bsd-2-clause" | "bsd-3-clause" | "isc" | "unlicense"
            | "cc0-1.0" | "cc-by-4.0" | "bsl-1.0" | "zlib" | "lgpl-2.1" | "lgpl-2.1-only"
            | "lgpl-2.1-or-later" => 1.0,
            "lgpl-3.0" | "mpl-2.0" | "epl-2.0" | "cc-by-sa-4.0" | "artistic-2.0" => 0.6,
            "gpl-2.0" | "gpl-3.0" | "agpl-3.0" | "openrail" | "openrail++" | "creativeml-openrail-m" => 0.3,
            l if l.starts_with("cc-by-nc") || l.starts_with("llama") => 0.1,
            _ => 0.0,
        }
    }
}

impl Default for LicenseMetric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Metric for LicenseMetric {
    fn name(&self) -> &str {
        names::LICENSE
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::General]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        Ok(ScoreValue::Scalar(Self::compatibility(&artifact.license)))
    }
}

/// Deployability per device class, from the weight size
pub struct SizeMetric {
    budgets: Vec<(&'static str, f64)>,
}

impl SizeMetric {
    pub fn new() -> Self {
        Self {
            budgets: vec![
                ("raspberry_pi", 1.0 * GIB),
                ("jetson_nano", 4.0 * GIB),
                ("desktop_pc", 16.0 * GIB),
                ("aws_server", 64.0 * GIB),
            ],
        }
    }
}

impl Default for SizeMetric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Metric for SizeMetric {
    fn name(&self) -> &str {
        names::SIZE
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::General]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let size = artifact.size_bytes as f64;
        Ok(ScoreValue::breakdown(self.budgets.iter().map(|(device, budget)| {
            (*device, 1.0 - saturating_scale(size, *budget, budget * 4.0))
        })))
    }
}

/// Contributor diversity of the code behind the model
pub struct BusFactorMetric {
    store: Arc<dyn ArtifactStore>,
}

impl BusFactorMetric {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Score from author emails, one per commit
    fn from_authors(authors: &[Value]) -> Result<f64, MetricError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for author in authors {
            let email = author.as_str().ok_or_else(|| {
                MetricError::InvalidInput("commit_authors must be strings".to_string())
            })?;
            let email = email.trim().to_lowercase();
            if !email.is_empty() {
                *counts.entry(email).or_default() += 1;
            }
        }
        let total: usize = counts.values().sum();
        let Some(top) = counts.values().max() else {
            return Ok(0.0);
        };
        let diversity = 1.0 - *top as f64 / total as f64;
        Ok(Self::combine(diversity, counts.len() as f64))
    }

    fn combine(diversity: f64, contributors: f64) -> f64 {
        (0.7 * diversity + 0.3 * saturating_scale(contributors, 5.0, 20.0)).clamp(0.0, 1.0)
    }

    fn score(base: &ArtifactBase) -> Result<f64, MetricError> {
        if let Some(authors) = base.metadata.get("commit_authors").and_then(Value::as_array) {
            return Self::from_authors(authors);
        }
        let Some(contributors) = base.metadata_f64("contributors").filter(|c| *c >= 1.0) else {
            return Ok(0.0);
        };
        let share = base
            .metadata_f64("top_contributor_share")
            .unwrap_or(1.0 / contributors);
        if !(0.0..=1.0).contains(&share) {
            return Err(MetricError::InvalidInput(format!(
                "top_contributor_share must be within [0, 1], got {}",
                share
            )));
        }
        Ok(Self::combine(1.0 - share, contributors))
    }
}

#[async_trait]
impl Metric for BusFactorMetric {
    fn name(&self) -> &str {
        names::BUS_FACTOR
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::General, MetricCategory::Code]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let score = match linked(self.store.as_ref(), artifact.code_artifact_id).await? {
            Some(code) => Self::score(code.base())?,
            None => Self::score(&artifact.base)?,
        };
        Ok(ScoreValue::Scalar(score))
    }
}

/// Documentation depth and worked examples
pub struct RampUpMetric;

impl RampUpMetric {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RampUpMetric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Metric for RampUpMetric {
    fn name(&self) -> &str {
        names::RAMP_UP
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::General]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let readme = saturating_scale(word_count(&artifact.base, "readme") as f64, 100.0, 500.0);
        let examples = flag(&artifact.base, "has_examples");
        Ok(ScoreValue::Scalar(0.7 * readme + 0.3 * examples))
    }
}

/// Whether the model's code and dataset are in the catalog
pub struct AvailabilityMetric;

impl AvailabilityMetric {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AvailabilityMetric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Metric for AvailabilityMetric {
    fn name(&self) -> &str {
        names::AVAILABILITY
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::Code, MetricCategory::Dataset]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let code = if artifact.code_artifact_id.is_some() { 0.5 } else { 0.0 };
        let dataset = if artifact.dataset_artifact_id.is_some() { 0.5 } else { 0.0 };
        Ok(ScoreValue::Scalar(code + dataset))
    }
}

/// Engineering hygiene of the linked code repository
pub struct CodeQualityMetric {
    store: Arc<dyn ArtifactStore>,
}

impl CodeQualityMetric {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Metric for CodeQualityMetric {
    fn name(&self) -> &str {
        names::CODE_QUALITY
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::Code]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let Some(code) = linked(self.store.as_ref(), artifact.code_artifact_id).await? else {
            return Ok(ScoreValue::Scalar(0.0));
        };
        let base = code.base();
        let signals = flag(base, "has_tests") + flag(base, "has_ci") + flag(base, "has_lint");
        Ok(ScoreValue::Scalar(signals / 3.0))
    }
}

/// Documentation, licensing and uptake of the linked dataset
pub struct DatasetQualityMetric {
    store: Arc<dyn ArtifactStore>,
}

impl DatasetQualityMetric {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Metric for DatasetQualityMetric {
    fn name(&self) -> &str {
        names::DATASET_QUALITY
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::Dataset]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let Some(dataset) = linked(self.store.as_ref(), artifact.dataset_artifact_id).await? else {
            return Ok(ScoreValue::Scalar(0.0));
        };
        let base = dataset.base();
        let documented = if word_count(base, "description") > 0 { 1.0 } else { 0.0 };
        let licensed = if base.metadata_str("license").is_some_and(|l| !l.trim().is_empty()) {
            1.0
        } else {
            0.0
        };
        let uptake = saturating_scale(base.metadata_f64("downloads").unwrap_or(0.0), 1_000.0, 100_000.0);
        Ok(ScoreValue::Scalar((documented + licensed + uptake) / 3.0))
    }
}

/// Evidence backing the model's performance claims
pub struct PerformanceClaimsMetric;

impl PerformanceClaimsMetric {
    const KEYWORDS: [&'static str; 7] = [
        "accuracy",
        "f1",
        "bleu",
        "rouge",
        "benchmark",
        "perplexity",
        "exact match",
    ];

    pub fn new() -> Self {
        Self
    }
}

impl Default for PerformanceClaimsMetric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Metric for PerformanceClaimsMetric {
    fn name(&self) -> &str {
        names::PERFORMANCE_CLAIMS
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::General]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let benchmarks = match artifact.base.metadata.get("benchmarks") {
            None | Some(Value::Null) => 0,
            Some(Value::Array(entries)) => entries.len(),
            Some(_) => {
                return Err(MetricError::InvalidInput(
                    "benchmarks must be a list".to_string(),
                ))
            }
        };
        let readme = artifact
            .base
            .metadata_str("readme")
            .unwrap_or_default()
            .to_lowercase();
        let mentions = Self::KEYWORDS.iter().filter(|k| readme.contains(*k)).count();
        let claims = (benchmarks + mentions) as f64;
        Ok(ScoreValue::Scalar(saturating_scale(claims, 2.0, 8.0)))
    }
}

/// Mean NetScore of the model's recorded ancestors
pub struct TreescoreMetric {
    store: Arc<dyn ArtifactStore>,
}

impl TreescoreMetric {
    /// Score given to a model without recorded ancestors
    pub const ROOT_SCORE: f64 = 0.5;

    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Metric for TreescoreMetric {
    fn name(&self) -> &str {
        names::TREESCORE
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::Lineage]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let mut visited = HashSet::from([artifact.id()]);
        let mut next = artifact.parent_model_id;
        let mut scores = Vec::new();

        while let Some(id) = next {
            if !visited.insert(id) || visited.len() > MAX_ANCESTRY_DEPTH {
                break;
            }
            let Some(parent) = self
                .store
                .locate(&id)
                .await?
                .and_then(|(_, a)| a.into_model())
            else {
                break;
            };
            if let Some(score) = parent.net_score().filter(|s| s.is_finite()) {
                scores.push(score);
            }
            next = parent.parent_model_id;
        }

        if scores.is_empty() {
            return Ok(ScoreValue::Scalar(Self::ROOT_SCORE));
        }
        Ok(ScoreValue::Scalar(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}

/// Whether the model ships runnable examples backed by its code
pub struct ReproducibilityMetric;

impl ReproducibilityMetric {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReproducibilityMetric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Metric for ReproducibilityMetric {
    fn name(&self) -> &str {
        names::REPRODUCIBILITY
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::General, MetricCategory::Code]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let examples = flag(&artifact.base, "has_examples");
        let code = if artifact.code_artifact_id.is_some() { 1.0 } else { 0.0 };
        Ok(ScoreValue::Scalar((examples + code) / 2.0))
    }
}

/// Share of the linked code that went through review
pub struct ReviewednessMetric {
    store: Arc<dyn ArtifactStore>,
}

impl ReviewednessMetric {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Metric for ReviewednessMetric {
    fn name(&self) -> &str {
        names::REVIEWEDNESS
    }

    fn categories(&self) -> &[MetricCategory] {
        &[MetricCategory::Code]
    }

    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError> {
        let Some(code) = linked(self.store.as_ref(), artifact.code_artifact_id).await? else {
            return Ok(ScoreValue::Scalar(0.0));
        };
        match code.base().metadata_f64("reviewed_fraction") {
            None => Ok(ScoreValue::Scalar(0.0)),
            Some(fraction) if (0.0..=1.0).contains(&fraction) => Ok(ScoreValue::Scalar(fraction)),
            Some(fraction) => Err(MetricError::InvalidInput(format!(
                "reviewed_fraction must be within [0, 1], got {}",
                fraction
            ))),
        }
    }
}
