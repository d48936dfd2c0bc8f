use modelguard_db::ArtifactStore;
use std::fmt;
use std::sync::Arc;

use super::builtin::{
    AvailabilityMetric, BusFactorMetric, CodeQualityMetric, DatasetQualityMetric, LicenseMetric,
    PerformanceClaimsMetric, RampUpMetric, ReproducibilityMetric, ReviewednessMetric, SizeMetric,
    TreescoreMetric,
};
use super::{Metric, MetricSubset};
use crate::error::{ServiceError, ServiceResult};

/// The set of metrics the score engine runs, in registration order
#[derive(Clone, Default)]
pub struct MetricRegistry {
    metrics: Vec<Arc<dyn Metric>>,
}

impl MetricRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in metric.
    ///
    /// Metrics that read linked artifacts or the parent chain use `store`.
    pub fn builtin(store: Arc<dyn ArtifactStore>) -> Self {
        let metrics: Vec<Arc<dyn Metric>> = vec![
            Arc::new(AvailabilityMetric::new()),
            Arc::new(BusFactorMetric::new(store.clone())),
            Arc::new(CodeQualityMetric::new(store.clone())),
            Arc::new(DatasetQualityMetric::new(store.clone())),
            Arc::new(LicenseMetric::new()),
            Arc::new(PerformanceClaimsMetric::new()),
            Arc::new(RampUpMetric::new()),
            Arc::new(SizeMetric::new()),
            Arc::new(TreescoreMetric::new(store.clone())),
            Arc::new(ReproducibilityMetric::new()),
            Arc::new(ReviewednessMetric::new(store)),
        ];
        Self { metrics }
    }

    /// Add a metric; names must be unique
    pub fn register(mut self, metric: impl Metric + 'static) -> ServiceResult<Self> {
        self.register_arc(Arc::new(metric))?;
        Ok(self)
    }

    /// Add a shared metric; names must be unique
    pub fn register_arc(&mut self, metric: Arc<dyn Metric>) -> ServiceResult<()> {
        if self.get(metric.name()).is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "Metric already registered: {}",
                metric.name()
            )));
        }
        self.metrics.push(metric);
        Ok(())
    }

    /// Look up a metric by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Metric>> {
        self.metrics.iter().find(|m| m.name() == name)
    }

    /// All registered metrics
    pub fn metrics(&self) -> &[Arc<dyn Metric>] {
        &self.metrics
    }

    /// Metrics belonging to a subset
    pub fn subset(&self, subset: MetricSubset) -> Vec<Arc<dyn Metric>> {
        self.metrics
            .iter()
            .filter(|m| subset.includes(m.categories()))
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.names())
            .finish()
    }
}
