//! Score engine
//!
//! Runs registered metrics concurrently against a model, isolates per-metric
//! failures, and computes the NetScore once every metric has finished.

use futures::FutureExt;
use modelguard_core::{net_score, MetricWeights, ModelArtifact, ScoreCard, ScoreValue, NET_SCORE};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::error::MetricError;
use crate::metrics::{Metric, MetricRegistry, MetricSubset};

/// Concurrent metric runner
#[derive(Debug, Clone)]
pub struct ScoreEngine {
    registry: Arc<MetricRegistry>,
    weights: MetricWeights,
    max_workers: usize,
    timeout: Duration,
}

impl ScoreEngine {
    /// Create a new score engine
    pub fn new(registry: Arc<MetricRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            weights: config.weights.clone(),
            max_workers: config.max_metric_workers.max(1),
            timeout: config.metric_timeout(),
        }
    }

    /// The metrics this engine runs
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Run every registered metric and compute the NetScore.
    ///
    /// Every metric appears in the result. A metric that errors, times out or
    /// panics is recorded as `0.0` with a latency of `0.0`.
    #[instrument(skip(self, model), fields(artifact_id = %model.id(), metrics = self.registry.len()))]
    pub async fn compute_scores(&self, model: &ModelArtifact) -> ScoreCard {
        let mut card = self.run_metrics(model, self.registry.metrics().to_vec()).await;
        let started = Instant::now();
        let net = net_score(&card.scores, &self.weights);
        card.record(NET_SCORE, ScoreValue::Scalar(net), elapsed_ms(started));
        debug!(net_score = net, "Scoring complete");
        card
    }

    /// Replace the model's scores with a full scoring pass
    pub async fn score_artifact(&self, model: &mut ModelArtifact) {
        let card = self.compute_scores(model).await;
        model.apply_score_card(card);
    }

    /// Recompute one subset of metrics, merge it into the model's scores and
    /// refresh the NetScore. Returns the names of the recomputed metrics.
    #[instrument(skip(self, model), fields(artifact_id = %model.id(), subset = %subset))]
    pub async fn rescore(&self, model: &mut ModelArtifact, subset: MetricSubset) -> Vec<String> {
        let metrics = self.registry.subset(subset);
        let names: Vec<String> = metrics.iter().map(|m| m.name().to_string()).collect();
        let partial = self.run_metrics(model, metrics).await;
        model.merge_score_card(partial);

        let started = Instant::now();
        let net = net_score(&model.scores, &self.weights);
        model.scores.insert(NET_SCORE.to_string(), ScoreValue::Scalar(net));
        model
            .scores_latency
            .insert(NET_SCORE.to_string(), elapsed_ms(started));
        debug!(net_score = net, recomputed = names.len(), "Rescore complete");
        names
    }

    /// Fan out `metrics` over a bounded pool and join them all
    async fn run_metrics(&self, model: &ModelArtifact, metrics: Vec<Arc<dyn Metric>>) -> ScoreCard {
        let mut card = ScoreCard::new();
        if metrics.is_empty() {
            return card;
        }

        let permits = self.max_workers.min(metrics.len());
        let semaphore = Arc::new(Semaphore::new(permits));
        let snapshot = Arc::new(model.clone());
        let mut tasks = JoinSet::new();

        for metric in &metrics {
            let metric = Arc::clone(metric);
            let snapshot = Arc::clone(&snapshot);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.timeout;

            tasks.spawn(async move {
                let name = metric.name().to_string();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, Err(MetricError::Cancelled), 0.0);
                };
                let started = Instant::now();
                let evaluation = AssertUnwindSafe(metric.evaluate(&snapshot)).catch_unwind();
                let outcome = match tokio::time::timeout(timeout, evaluation).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(panic)) => Err(MetricError::Panicked(panic_message(panic.as_ref()))),
                    Err(_) => Err(MetricError::Timeout(timeout)),
                };
                (name, outcome, elapsed_ms(started))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(value), latency)) => {
                    debug!(metric = %name, score = %value, latency_ms = latency, "Metric evaluated");
                    card.record(name, value.clamped(), latency);
                }
                Ok((name, Err(err), _)) => {
                    warn!(metric = %name, error = %err, "Metric failed, recording 0.0");
                    card.record(name, ScoreValue::Scalar(0.0), 0.0);
                }
                Err(err) => {
                    warn!(error = %err, "Metric task did not complete");
                }
            }
        }

        // A task lost to the runtime still gets its zero entry
        for metric in &metrics {
            if !card.scores.contains_key(metric.name()) {
                card.record(metric.name(), ScoreValue::Scalar(0.0), 0.0);
            }
        }

        card
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
