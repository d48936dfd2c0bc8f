//! Scoring metrics
//!
//! A metric is a side-effect-free function from a model artifact to a score in
//! `[0, 1]` (or a breakdown of such scores). Metrics are collected in an
//! explicit [`MetricRegistry`] value that the score engine runs.

use async_trait::async_trait;
use modelguard_core::{ModelArtifact, ScoreValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MetricError, ServiceError};

mod builtin;
mod registry;

pub use builtin::{
    AvailabilityMetric, BusFactorMetric, CodeQualityMetric, DatasetQualityMetric, LicenseMetric,
    PerformanceClaimsMetric, RampUpMetric, ReproducibilityMetric, ReviewednessMetric, SizeMetric,
    TreescoreMetric,
};
pub use registry::MetricRegistry;

/// What a metric looks at; drives targeted rescoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    /// The model's own metadata
    General,
    /// The linked code repository
    Code,
    /// The linked dataset
    Dataset,
    /// The parent chain
    Lineage,
}

/// Named group of metrics recomputed together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricSubset {
    All,
    CodeRelevant,
    DatasetRelevant,
    LineageRelevant,
}

impl MetricSubset {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricSubset::All => "all",
            MetricSubset::CodeRelevant => "code-relevant",
            MetricSubset::DatasetRelevant => "dataset-relevant",
            MetricSubset::LineageRelevant => "lineage-relevant",
        }
    }

    /// Whether a metric with these categories belongs to the subset
    pub fn includes(&self, categories: &[MetricCategory]) -> bool {
        let wanted = match self {
            MetricSubset::All => return true,
            MetricSubset::CodeRelevant => MetricCategory::Code,
            MetricSubset::DatasetRelevant => MetricCategory::Dataset,
            MetricSubset::LineageRelevant => MetricCategory::Lineage,
        };
        categories.contains(&wanted)
    }
}

impl fmt::Display for MetricSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricSubset {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(MetricSubset::All),
            "code-relevant" => Ok(MetricSubset::CodeRelevant),
            "dataset-relevant" => Ok(MetricSubset::DatasetRelevant),
            "lineage-relevant" => Ok(MetricSubset::LineageRelevant),
            other => Err(ServiceError::InvalidInput(format!(
                "Unknown metric subset: {}",
                other
            ))),
        }
    }
}

/// A scoring function over model artifacts
#[async_trait]
pub trait Metric: Send + Sync {
    /// Key under which the score is stored
    fn name(&self) -> &str;

    /// Inputs the metric depends on
    fn categories(&self) -> &[MetricCategory];

    /// Score the model; values outside `[0, 1]` are clamped by the engine
    async fn evaluate(&self, artifact: &ModelArtifact) -> Result<ScoreValue, MetricError>;
}

/// Piecewise-linear scaling: half credit at `knee`, full credit at `max_x`
pub fn saturating_scale(x: f64, knee: f64, max_x: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        0.0
    } else if x >= max_x {
        1.0
    } else if x <= knee {
        x / knee * 0.5
    } else {
        0.5 + (x - knee) / (max_x - knee) * 0.5
    }
}
