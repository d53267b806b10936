//! Test helpers: scripted in-process KBC backend
//!
//! Records every call and answers from scripted data. Evaluation stats,
//! embed and evaluate responses can be gated so tests decide the completion
//! order.

#![allow(dead_code)]

use async_trait::async_trait;
use kbc_dash::models::{
    EvaluationKey, EvaluationMetrics, EvaluationReport, GarbageImageRecord, GarbageMetricRecord,
    OntologyFile, OntologySummary,
};
use kbc_dash::services::{
    BackendError, BackendResult, EvaluateOutput, ExtractOutput, KbcBackend, StageAck, UploadAck,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

pub type StatsReply = BackendResult<EvaluationReport>;

/// Release signal for a gated embed or evaluate call
pub type Release = oneshot::Sender<()>;

#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    ontologies: Mutex<Vec<String>>,
    summaries: Mutex<HashMap<String, OntologySummary>>,
    reports: Mutex<HashMap<EvaluationKey, EvaluationReport>>,
    stats_gates: Mutex<HashMap<EvaluationKey, oneshot::Receiver<StatsReply>>>,
    embed_gate: Mutex<Option<oneshot::Receiver<()>>>,
    evaluate_gates: Mutex<HashMap<EvaluationKey, oneshot::Receiver<()>>>,
    /// Operation name → error message
    failures: Mutex<HashMap<&'static str, String>>,
    /// Ontologies whose stats query fails
    failing_stats: Mutex<HashSet<EvaluationKey>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ontologies(names: &[&str]) -> Self {
        let backend = Self::new();
        *backend.ontologies.lock().unwrap() = names.iter().map(|s| s.to_string()).collect();
        backend
    }

    pub fn set_summary(&self, summary: OntologySummary) {
        self.summaries
            .lock()
            .unwrap()
            .insert(summary.id.clone(), summary);
    }

    pub fn set_report(&self, key: &EvaluationKey, report: EvaluationReport) {
        self.reports.lock().unwrap().insert(key.clone(), report);
    }

    /// Make `operation` ("upload", "extract", "embed", "evaluate",
    /// "list_ontologies", "ontology_stats") fail with `message`
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, message.to_string());
    }

    pub fn fail_stats(&self, key: &EvaluationKey) {
        self.failing_stats.lock().unwrap().insert(key.clone());
    }

    /// Hold the next stats response for `key` until the sender fires
    pub fn gate_stats(&self, key: &EvaluationKey) -> oneshot::Sender<StatsReply> {
        let (tx, rx) = oneshot::channel();
        self.stats_gates.lock().unwrap().insert(key.clone(), rx);
        tx
    }

    /// Hold the next embed call until the sender fires (or is dropped)
    pub fn gate_embed(&self) -> Release {
        let (tx, rx) = oneshot::channel();
        *self.embed_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Hold the next evaluate call for `key` until the sender fires
    pub fn gate_evaluate(&self, key: &EvaluationKey) -> Release {
        let (tx, rx) = oneshot::channel();
        self.evaluate_gates.lock().unwrap().insert(key.clone(), rx);
        tx
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Poll until a call starting with `prefix` has been recorded
    pub async fn wait_for_call(&self, prefix: &str) {
        for _ in 0..400 {
            if self.call_count(prefix) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("backend never saw a call starting with {:?}", prefix);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn scripted_failure(&self, operation: &'static str) -> Option<BackendError> {
        self.failures
            .lock()
            .unwrap()
            .get(operation)
            .map(|message| BackendError::Api {
                operation,
                status: 500,
                message: Some(message.clone()),
            })
    }

    fn summary_for(&self, ontology: &str) -> OntologySummary {
        self.summaries
            .lock()
            .unwrap()
            .get(ontology)
            .cloned()
            .unwrap_or_else(|| summary(ontology, 0, 0, 0, 0))
    }

    fn report_for(&self, key: &EvaluationKey) -> Option<EvaluationReport> {
        self.reports.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KbcBackend for FakeBackend {
    async fn upload(
        &self,
        file: OntologyFile,
        ontology_name: &str,
        alias: &str,
    ) -> BackendResult<UploadAck> {
        self.record(format!("upload {} {} {}", file.file_name, ontology_name, alias));
        if let Some(e) = self.scripted_failure("upload") {
            return Err(e);
        }
        self.ontologies
            .lock()
            .unwrap()
            .push(ontology_name.to_string());
        Ok(UploadAck {
            message: Some("Upload successful".to_string()),
            ontology_name: ontology_name.to_string(),
        })
    }

    async fn extract(&self, ontology: &str) -> BackendResult<ExtractOutput> {
        self.record(format!("extract {}", ontology));
        if let Some(e) = self.scripted_failure("extract") {
            return Err(e);
        }
        Ok(ExtractOutput {
            message: Some("Extraction successful".to_string()),
            summary: self.summary_for(ontology),
        })
    }

    async fn list_ontologies(&self) -> BackendResult<Vec<String>> {
        self.record("list_ontologies".to_string());
        if let Some(e) = self.scripted_failure("list_ontologies") {
            return Err(e);
        }
        Ok(self.ontologies.lock().unwrap().clone())
    }

    async fn ontology_stats(&self, ontology: &str) -> BackendResult<OntologySummary> {
        self.record(format!("ontology_stats {}", ontology));
        if let Some(e) = self.scripted_failure("ontology_stats") {
            return Err(e);
        }
        Ok(self.summary_for(ontology))
    }

    async fn embed(&self, ontology: &str, algorithm: &str) -> BackendResult<StageAck> {
        self.record(format!("embed {} {}", ontology, algorithm));
        let gate = self.embed_gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if let Some(e) = self.scripted_failure("embed") {
            return Err(e);
        }
        Ok(StageAck {
            message: Some("Embedding successful".to_string()),
        })
    }

    async fn evaluate(&self, key: &EvaluationKey) -> BackendResult<EvaluateOutput> {
        self.record(format!("evaluate {}", key));
        let gate = self.evaluate_gates.lock().unwrap().remove(key);
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if let Some(e) = self.scripted_failure("evaluate") {
            return Err(e);
        }
        Ok(EvaluateOutput {
            message: Some("Evaluation successful".to_string()),
            report: self.report_for(key).unwrap_or_default(),
        })
    }

    async fn evaluation_stats(&self, key: &EvaluationKey) -> BackendResult<EvaluationReport> {
        self.record(format!("evaluation_stats {}", key));

        let gate = self.stats_gates.lock().unwrap().remove(key);
        if let Some(rx) = gate {
            return match rx.await {
                Ok(reply) => reply,
                Err(_) => Err(BackendError::Network {
                    operation: "evaluation stats",
                    message: "gate dropped".to_string(),
                }),
            };
        }

        if self.failing_stats.lock().unwrap().contains(key) {
            return Err(BackendError::Api {
                operation: "evaluation stats",
                status: 404,
                message: Some("No evaluation stored".to_string()),
            });
        }

        self.report_for(key).ok_or_else(|| BackendError::Api {
            operation: "evaluation stats",
            status: 404,
            message: Some("No evaluation stored".to_string()),
        })
    }
}

pub fn summary(id: &str, classes: u64, individuals: u64, axioms: u64, annotations: u64) -> OntologySummary {
    OntologySummary {
        id: id.to_string(),
        classes,
        individuals,
        axioms,
        annotations,
    }
}

/// Report with `count` garbage pairs whose individuals are `<tag>-<i>`
pub fn report(tag: &str, count: usize) -> EvaluationReport {
    let records = (0..count)
        .map(|i| GarbageMetricRecord {
            individual: format!("{}-{}", tag, i),
            predicted_label: "Predicted".to_string(),
            predicted_rank: 1,
            true_label: "True".to_string(),
            true_rank: 2 + i as u64,
            score_predicted: 0.9,
            score_true: 0.3,
            rank_difference: 1 + i as i64,
        })
        .collect();
    let images = (0..count)
        .map(|i| GarbageImageRecord {
            diagram: format!("digraph {}_{} {{}}", tag, i),
        })
        .collect();
    let metrics = EvaluationMetrics {
        mrr: 0.42,
        hit_at_1: 0.3,
        hit_at_5: 0.6,
        hit_at_10: 0.8,
        garbage_count: count as u64,
        total: 20,
        avg_garbage_rank: 1.5,
        avg_true_rank: 3.5,
    };
    EvaluationReport::from_parallel(metrics, records, images)
}

pub fn ontology_file(name: &str) -> OntologyFile {
    OntologyFile::new(name, b"<rdf:RDF/>".to_vec())
}
