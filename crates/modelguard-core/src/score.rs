//! Score maps and the NetScore aggregation
//!
//! A metric produces either a single value in `[0, 1]` or a breakdown of named
//! sub-scores (for example per-device size scores). The composite NetScore is
//! a weighted mean over whichever weighted metrics are present in the map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RegistryError, Result};

/// Key under which the composite score is stored in a [`ScoreMap`]
pub const NET_SCORE: &str = "NetScore";

/// Names of the built-in metrics
pub mod names {
    pub const LICENSE: &str = "License";
    pub const SIZE: &str = "Size";
    pub const TREESCORE: &str = "Treescore";
    pub const CODE_QUALITY: &str = "CodeQuality";
    pub const DATASET_QUALITY: &str = "DatasetQuality";
    pub const RAMP_UP: &str = "RampUp";
    pub const AVAILABILITY: &str = "Availability";
    pub const BUS_FACTOR: &str = "BusFactor";
    pub const PERFORMANCE_CLAIMS: &str = "PerformanceClaims";
    pub const REPRODUCIBILITY: &str = "Reproducibility";
    pub const REVIEWEDNESS: &str = "Reviewedness";
}

/// Value produced by a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    /// A single score
    Scalar(f64),
    /// Named sub-scores, e.g. `{"raspberry_pi": 0.2, "aws_server": 0.8}`
    Breakdown(BTreeMap<String, f64>),
}

impl ScoreValue {
    /// Create a breakdown from `(key, value)` pairs
    pub fn breakdown<K: Into<String>>(entries: impl IntoIterator<Item = (K, f64)>) -> Self {
        ScoreValue::Breakdown(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Collapse to a single scalar: the value itself, or the arithmetic mean of a
    /// breakdown (`0.0` for an empty breakdown)
    pub fn collapse(&self) -> f64 {
        match self {
            ScoreValue::Scalar(v) => *v,
            ScoreValue::Breakdown(parts) if parts.is_empty() => 0.0,
            ScoreValue::Breakdown(parts) => parts.values().sum::<f64>() / parts.len() as f64,
        }
    }

    /// Return the scalar if this is not a breakdown
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ScoreValue::Scalar(v) => Some(*v),
            ScoreValue::Breakdown(_) => None,
        }
    }

    /// Clamp every leaf into `[0, 1]`; NaN becomes `0.0`
    pub fn clamped(self) -> Self {
        match self {
            ScoreValue::Scalar(v) => ScoreValue::Scalar(clamp01(v)),
            ScoreValue::Breakdown(parts) => ScoreValue::Breakdown(
                parts.into_iter().map(|(k, v)| (k, clamp01(v))).collect(),
            ),
        }
    }
}

impl From<f64> for ScoreValue {
    fn from(v: f64) -> Self {
        ScoreValue::Scalar(v)
    }
}

impl fmt::Display for ScoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreValue::Scalar(v) => write!(f, "{:.3}", v),
            ScoreValue::Breakdown(parts) => {
                let rendered: Vec<String> =
                    parts.iter().map(|(k, v)| format!("{}={:.3}", k, v)).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

/// Metric name to score
pub type ScoreMap = BTreeMap<String, ScoreValue>;

/// Metric name to wall-clock latency in milliseconds
pub type LatencyMap = BTreeMap<String, f64>;

/// Clamp to `[0, 1]`, mapping NaN to `0.0`
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Per-metric weights used by the NetScore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricWeights(BTreeMap<String, f64>);

impl MetricWeights {
    /// Build weights from `(metric, weight)` pairs
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        Self(pairs.into_iter().map(|(k, w)| (k.into(), w)).collect())
    }

    /// Weight for a metric, if it participates in the NetScore
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0.get(metric).copied()
    }

    /// Sum of all configured weights
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Iterate over `(metric, weight)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, w)| (k.as_str(), *w))
    }

    /// Reject negative or non-finite weights
    pub fn validate(&self) -> Result<()> {
        for (metric, weight) in &self.0 {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(RegistryError::ValidationError(format!(
                    "Weight for {} must be a non-negative number, got {}",
                    metric, weight
                )));
            }
        }
        Ok(())
    }
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self::from_pairs([
            (names::LICENSE, 0.22),
            (names::SIZE, 0.12),
            (names::TREESCORE, 0.16),
            (names::CODE_QUALITY, 0.10),
            (names::DATASET_QUALITY, 0.10),
            (names::RAMP_UP, 0.10),
            (names::AVAILABILITY, 0.08),
            (names::BUS_FACTOR, 0.06),
            (names::PERFORMANCE_CLAIMS, 0.06),
        ])
    }
}

/// Weighted composite over the metrics present in `scores`
///
/// Breakdowns are averaged, each value is clamped to `[0, 1]`, and metrics
/// missing from the map contribute to neither the numerator nor the
/// denominator. Returns `0.0` when no weighted metric is present.
pub fn net_score(scores: &ScoreMap, weights: &MetricWeights) -> f64 {
    let mut total = 0.0;
    let mut weight_sum = 0.0;

    for (metric, value) in scores {
        if metric == NET_SCORE {
            continue;
        }
        let Some(weight) = weights.get(metric) else {
            continue;
        };
        total += weight * clamp01(value.collapse());
        weight_sum += weight;
    }

    if weight_sum > 0.0 {
        clamp01(total / weight_sum)
    } else {
        0.0
    }
}

/// Every leaf score strictly below `threshold`
///
/// Breakdown sub-scores are reported as `"Metric.sub_key"`. A non-finite leaf
/// is malformed input and is returned as an error rather than being skipped.
pub fn scores_below_threshold(scores: &ScoreMap, threshold: f64) -> Result<Vec<String>> {
    let mut failing = Vec::new();

    for (metric, value) in scores {
        match value {
            ScoreValue::Scalar(v) => {
                check_finite(metric, *v)?;
                if *v < threshold {
                    failing.push(metric.clone());
                }
            }
            ScoreValue::Breakdown(parts) => {
                for (sub_key, v) in parts {
                    let key = format!("{}.{}", metric, sub_key);
                    check_finite(&key, *v)?;
                    if *v < threshold {
                        failing.push(key);
                    }
                }
            }
        }
    }

    Ok(failing)
}

fn check_finite(metric: &str, v: f64) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(RegistryError::InvalidScore {
            metric: metric.to_string(),
            reason: format!("{} is not a finite number", v),
        })
    }
}

/// Result of a scoring pass: per-metric values and latencies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// Metric scores, including `NetScore` once computed
    pub scores: ScoreMap,
    /// Metric latencies in milliseconds
    pub latencies: LatencyMap,
}

impl ScoreCard {
    /// Create an empty score card
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a metric result
    pub fn record(&mut self, metric: impl Into<String>, value: ScoreValue, latency_ms: f64) {
        let metric = metric.into();
        self.latencies.insert(metric.clone(), latency_ms.max(0.0));
        self.scores.insert(metric, value);
    }

    /// The stored NetScore, if computed
    pub fn net_score(&self) -> Option<f64> {
        self.scores.get(NET_SCORE).and_then(ScoreValue::as_scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_map(entries: &[(&str, f64)]) -> ScoreMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), ScoreValue::Scalar(*v)))
            .collect()
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let total = MetricWeights::default().total();
        assert!((total - 1.0).abs() < 1e-9, "weights sum to {}", total);
    }

    #[test]
    fn test_all_ones_is_one() {
        let weights = MetricWeights::default();
        let scores: ScoreMap = weights
            .iter()
            .map(|(k, _)| (k.to_string(), ScoreValue::Scalar(1.0)))
            .collect();
        assert!((net_score(&scores, &weights) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_zeros_is_zero() {
        let weights = MetricWeights::default();
        let scores: ScoreMap = weights
            .iter()
            .map(|(k, _)| (k.to_string(), ScoreValue::Scalar(0.0)))
            .collect();
        assert_eq!(net_score(&scores, &weights), 0.0);
    }

    #[test]
    fn test_missing_metrics_are_excluded() {
        let scores = scalar_map(&[(names::AVAILABILITY, 1.0), (names::LICENSE, 0.0)]);
        let result = net_score(&scores, &MetricWeights::default());
        assert!((result - 0.08 / 0.30).abs() < 1e-9, "got {}", result);
    }

    #[test]
    fn test_breakdown_is_averaged() {
        let value = ScoreValue::breakdown([("raspberry_pi", 0.2), ("aws_server", 0.8)]);
        assert!((value.collapse() - 0.5).abs() < 1e-9);

        let mut scores = ScoreMap::new();
        scores.insert(names::SIZE.to_string(), value);
        assert!((net_score(&scores, &MetricWeights::default()) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_breakdown_collapses_to_zero() {
        assert_eq!(ScoreValue::Breakdown(BTreeMap::new()).collapse(), 0.0);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let scores = scalar_map(&[(names::LICENSE, 3.0), (names::SIZE, -1.0)]);
        let result = net_score(&scores, &MetricWeights::default());
        assert!((0.0..=1.0).contains(&result));
        assert!((result - 0.22 / 0.34).abs() < 1e-9);
    }

    #[test]
    fn test_no_weighted_metrics_is_zero() {
        let scores = scalar_map(&[(names::REVIEWEDNESS, 1.0), (NET_SCORE, 1.0)]);
        assert_eq!(net_score(&scores, &MetricWeights::default()), 0.0);
    }

    #[test]
    fn test_net_score_key_is_ignored() {
        let scores = scalar_map(&[(names::LICENSE, 0.4), (NET_SCORE, 1.0)]);
        assert!((net_score(&scores, &MetricWeights::default()) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_scores_below_threshold_reports_dotted_keys() {
        let mut scores = scalar_map(&[(names::LICENSE, 0.3)]);
        scores.insert(
            names::SIZE.to_string(),
            ScoreValue::breakdown([("raspberry_pi", 0.9), ("jetson_nano", 0.2)]),
        );

        let failing = scores_below_threshold(&scores, 0.5).unwrap();
        assert_eq!(failing, vec!["License".to_string(), "Size.jetson_nano".to_string()]);
    }

    #[test]
    fn test_scores_at_threshold_pass() {
        let scores = scalar_map(&[(names::LICENSE, 0.5), (names::BUS_FACTOR, 0.75)]);
        assert!(scores_below_threshold(&scores, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_score_is_rejected() {
        let scores = scalar_map(&[(names::LICENSE, f64::NAN)]);
        let err = scores_below_threshold(&scores, 0.5).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidScore { .. }));
    }

    #[test]
    fn test_score_value_untagged_serde() {
        let scalar: ScoreValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(scalar, ScoreValue::Scalar(0.25));

        let breakdown: ScoreValue = serde_json::from_str(r#"{"desktop_pc": 1.0}"#).unwrap();
        assert_eq!(breakdown, ScoreValue::breakdown([("desktop_pc", 1.0)]));
    }

    #[test]
    fn test_score_card_record() {
        let mut card = ScoreCard::new();
        card.record(names::LICENSE, ScoreValue::Scalar(1.0), -5.0);
        card.record(NET_SCORE, ScoreValue::Scalar(0.7), 0.1);
        assert_eq!(card.latencies[names::LICENSE], 0.0);
        assert_eq!(card.net_score(), Some(0.7));
    }
}
