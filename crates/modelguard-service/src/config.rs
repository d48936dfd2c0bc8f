//! Engine configuration

use modelguard_core::{ConfusionPolicy, MetricWeights};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

/// Tunables for scoring, gating and confusion detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Leaf scores strictly below this value fail the quality gate
    pub minimum_metric_threshold: f64,

    /// Upper bound on concurrently running metrics
    pub max_metric_workers: usize,

    /// Time budget for a single metric evaluation
    pub metric_timeout_seconds: u64,

    /// How many popular names to compare against
    pub popular_names_limit: usize,

    /// How long fetched popular names stay cached
    pub popular_names_ttl_seconds: u64,

    /// Excerpts requested from the content extractor
    pub discovery_max_excerpts: usize,

    /// NetScore weights per metric
    pub weights: MetricWeights,

    /// Package-confusion thresholds
    pub confusion: ConfusionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimum_metric_threshold: 0.5,
            max_metric_workers: 8,
            metric_timeout_seconds: 30,
            popular_names_limit: 500,
            popular_names_ttl_seconds: 3600,
            discovery_max_excerpts: 5,
            weights: MetricWeights::default(),
            confusion: ConfusionPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn metric_timeout(&self) -> Duration {
        Duration::from_secs(self.metric_timeout_seconds)
    }

    pub fn popular_names_ttl(&self) -> Duration {
        Duration::from_secs(self.popular_names_ttl_seconds)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ServiceResult<()> {
        if !(0.0..=1.0).contains(&self.minimum_metric_threshold) {
            return Err(ServiceError::InvalidInput(format!(
                "minimum_metric_threshold must be within [0, 1], got {}",
                self.minimum_metric_threshold
            )));
        }
        if self.max_metric_workers == 0 {
            return Err(ServiceError::InvalidInput(
                "max_metric_workers must be greater than 0".to_string(),
            ));
        }
        if self.metric_timeout_seconds == 0 {
            return Err(ServiceError::InvalidInput(
                "metric_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        self.weights.validate()?;
        self.confusion.validate()?;
        Ok(())
    }
}
