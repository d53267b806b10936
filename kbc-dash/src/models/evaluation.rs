//! Link-prediction evaluation results

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Ranking-quality metrics for one (ontology, algorithm, classifier) run
///
/// `Default` is the zero-value record shown before any evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mrr: f64,
    pub hit_at_1: f64,
    pub hit_at_5: f64,
    pub hit_at_10: f64,
    pub garbage_count: u64,
    pub total: u64,
    pub avg_garbage_rank: f64,
    pub avg_true_rank: f64,
}

impl EvaluationMetrics {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// One test individual whose predicted class outranks the true class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarbageMetricRecord {
    pub individual: String,
    pub predicted_label: String,
    pub predicted_rank: u64,
    pub true_label: String,
    pub true_rank: u64,
    pub score_predicted: f64,
    pub score_true: f64,
    pub rank_difference: i64,
}

/// Opaque rendering payload (encoded image or graph description)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbageImageRecord {
    pub diagram: String,
}

/// A garbage metric together with the diagram explaining it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarbagePair {
    pub metric: GarbageMetricRecord,
    pub image: GarbageImageRecord,
}

/// Everything one evaluate / evaluation-stats response installs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: EvaluationMetrics,
    /// Backend order (most divergent first)
    pub garbage: Vec<GarbagePair>,
}

impl EvaluationReport {
    /// Pair up the two parallel arrays the backend sends
    ///
    /// Mismatched lengths are a contract violation: both sides are cut to the
    /// shorter length so that index `i` always names one individual.
    pub fn from_parallel(
        metrics: EvaluationMetrics,
        records: Vec<GarbageMetricRecord>,
        images: Vec<GarbageImageRecord>,
    ) -> Self {
        if records.len() != images.len() {
            warn!(
                metrics_len = records.len(),
                images_len = images.len(),
                "Garbage metric/image arrays differ in length, truncating to shorter"
            );
        }

        let garbage = records
            .into_iter()
            .zip(images)
            .map(|(metric, image)| GarbagePair { metric, image })
            .collect();

        Self { metrics, garbage }
    }
}
