//! KBC backend client
//!
//! The backend performs extraction, embedding and evaluation. This module
//! only knows its request/response contract.

use crate::models::{
    EvaluationKey, EvaluationMetrics, EvaluationReport, GarbageImageRecord, GarbageMetricRecord,
    OntologyFile, OntologySummary,
};
use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("kbc-dash/", env!("CARGO_PKG_VERSION"));

/// Backend call errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error during {operation}: {message}")]
    Network {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed with HTTP {status}")]
    Api {
        operation: &'static str,
        status: u16,
        /// `message` field of the backend's error body, if it sent one
        message: Option<String>,
    },

    #[error("Unexpected {operation} response: {message}")]
    Parse {
        operation: &'static str,
        message: String,
    },

    #[error("Invalid {operation} request: {message}")]
    InvalidRequest {
        operation: &'static str,
        message: String,
    },
}

impl BackendError {
    /// Text for the notification feed: the backend's own message when it
    /// provided one, otherwise a generic description
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Api {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Upload acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAck {
    pub message: Option<String>,
    /// Canonical name; the backend may normalize what was sent
    pub ontology_name: String,
}

/// Extraction result
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOutput {
    pub message: Option<String>,
    pub summary: OntologySummary,
}

/// Acknowledgement carrying only a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAck {
    pub message: Option<String>,
}

/// Evaluate result
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateOutput {
    pub message: Option<String>,
    pub report: EvaluationReport,
}

/// Request/response contract the orchestrator depends on
#[async_trait]
pub trait KbcBackend: Send + Sync {
    async fn upload(
        &self,
        file: OntologyFile,
        ontology_name: &str,
        alias: &str,
    ) -> BackendResult<UploadAck>;

    async fn extract(&self, ontology: &str) -> BackendResult<ExtractOutput>;

    async fn list_ontologies(&self) -> BackendResult<Vec<String>>;

    /// Current structural statistics, read-only
    async fn ontology_stats(&self, ontology: &str) -> BackendResult<OntologySummary>;

    /// Train the embedding for `algorithm`
    async fn embed(&self, ontology: &str, algorithm: &str) -> BackendResult<StageAck>;

    async fn evaluate(&self, key: &EvaluationKey) -> BackendResult<EvaluateOutput>;

    /// Stored evaluation for `key`, read-only
    async fn evaluation_stats(&self, key: &EvaluationKey) -> BackendResult<EvaluationReport>;
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    ontology_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OntoData {
    no_class: u64,
    no_individual: u64,
    no_axiom: u64,
    no_annotation: u64,
}

impl OntoData {
    fn into_summary(self, id: &str) -> OntologySummary {
        OntologySummary {
            id: id.to_string(),
            classes: self.no_class,
            individuals: self.no_individual,
            axioms: self.no_axiom,
            annotations: self.no_annotation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtractBody {
    #[serde(default)]
    message: Option<String>,
    onto_data: OntoData,
}

#[derive(Debug, Deserialize)]
struct OntologyStatBody {
    onto_data: OntoData,
}

#[derive(Debug, Deserialize)]
struct OntologyListBody {
    onto_list: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PerformanceWire {
    mrr: f64,
    hit_at_1: f64,
    hit_at_5: f64,
    hit_at_10: f64,
    garbage: u64,
    total: u64,
    #[serde(rename = "average_garbage_Rank")]
    average_garbage_rank: f64,
    #[serde(rename = "average_Rank")]
    average_rank: f64,
}

impl From<PerformanceWire> for EvaluationMetrics {
    fn from(wire: PerformanceWire) -> Self {
        Self {
            mrr: wire.mrr,
            hit_at_1: wire.hit_at_1,
            hit_at_5: wire.hit_at_5,
            hit_at_10: wire.hit_at_10,
            garbage_count: wire.garbage,
            total: wire.total,
            avg_garbage_rank: wire.average_garbage_rank,
            avg_true_rank: wire.average_rank,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GarbageWire {
    #[serde(rename = "Individual")]
    individual: String,
    #[serde(rename = "Predicted")]
    predicted: String,
    #[serde(rename = "Predicted_rank")]
    predicted_rank: u64,
    #[serde(rename = "True")]
    true_label: String,
    #[serde(rename = "True_rank")]
    true_rank: u64,
    #[serde(rename = "Score_predict")]
    score_predict: f64,
    #[serde(rename = "Score_true")]
    score_true: f64,
    #[serde(rename = "Dif")]
    dif: i64,
}

impl From<GarbageWire> for GarbageMetricRecord {
    fn from(wire: GarbageWire) -> Self {
        Self {
            individual: wire.individual,
            predicted_label: wire.predicted,
            predicted_rank: wire.predicted_rank,
            true_label: wire.true_label,
            true_rank: wire.true_rank,
            score_predicted: wire.score_predict,
            score_true: wire.score_true,
            rank_difference: wire.dif,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageWire {
    #[serde(alias = "image")]
    dot_file: String,
}

#[derive(Debug, Deserialize)]
struct EvaluationBody {
    #[serde(default)]
    message: Option<String>,
    performance: PerformanceWire,
    #[serde(default)]
    garbage: Vec<GarbageWire>,
    #[serde(default)]
    images: Vec<ImageWire>,
}

impl EvaluationBody {
    fn into_output(self) -> EvaluateOutput {
        let report = EvaluationReport::from_parallel(
            self.performance.into(),
            self.garbage.into_iter().map(Into::into).collect(),
            self.images
                .into_iter()
                .map(|image| GarbageImageRecord {
                    diagram: image.dot_file,
                })
                .collect(),
        );
        EvaluateOutput {
            message: self.message,
            report,
        }
    }
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// reqwest-backed client for the Flask backend
pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_uri: &str, timeout: Duration) -> BackendResult<Self> {
        let base_url = Url::parse(base_uri).map_err(|e| BackendError::InvalidRequest {
            operation: "connect",
            message: format!("invalid backend URI '{}': {}", base_uri, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidRequest {
                operation: "connect",
                message: format!("backend URI '{}' cannot carry paths", base_uri),
            });
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network {
                operation: "connect",
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URI
    fn endpoint(&self, operation: &'static str, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::InvalidRequest {
                    operation,
                    message: "backend URI cannot carry paths".to_string(),
                })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> BackendResult<T> {
        tracing::debug!(%url, operation, "Backend GET");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::Network {
                operation,
                message: e.to_string(),
            })?;

        read_json(operation, response).await
    }
}

/// Decode a success body, or turn a non-2xx status into `BackendError::Api`
async fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> BackendResult<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<MessageBody>(&error_text)
            .ok()
            .and_then(|body| body.message);
        return Err(BackendError::Api {
            operation,
            status: status.as_u16(),
            message,
        });
    }

    response.json::<T>().await.map_err(|e| BackendError::Parse {
        operation,
        message: e.to_string(),
    })
}

#[async_trait]
impl KbcBackend for HttpBackend {
    async fn upload(
        &self,
        file: OntologyFile,
        ontology_name: &str,
        alias: &str,
    ) -> BackendResult<UploadAck> {
        let operation = "upload";
        let url = self.endpoint(operation, &["api", "upload"])?;

        let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
        let form = reqwest::multipart::Form::new()
            .part("owl_file", part)
            .text("ontology_name", ontology_name.to_string())
            .text("alias", alias.to_string());

        tracing::debug!(%url, ontology = ontology_name, "Backend POST upload");

        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::Network {
                operation,
                message: e.to_string(),
            })?;

        let body: UploadBody = read_json(operation, response).await?;
        Ok(UploadAck {
            message: body.message,
            ontology_name: body
                .ontology_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| ontology_name.to_string()),
        })
    }

    async fn extract(&self, ontology: &str) -> BackendResult<ExtractOutput> {
        let operation = "extract";
        let url = self.endpoint(operation, &["api", "extract", ontology])?;
        let body: ExtractBody = self.get_json(operation, url).await?;
        Ok(ExtractOutput {
            message: body.message,
            summary: body.onto_data.into_summary(ontology),
        })
    }

    async fn list_ontologies(&self) -> BackendResult<Vec<String>> {
        let operation = "list ontologies";
        let url = self.endpoint(operation, &["api", "ontology"])?;
        let body: OntologyListBody = self.get_json(operation, url).await?;
        Ok(body.onto_list)
    }

    async fn ontology_stats(&self, ontology: &str) -> BackendResult<OntologySummary> {
        let operation = "ontology stat";
        let url = self.endpoint(operation, &["api", "ontology", ontology])?;
        let body: OntologyStatBody = self.get_json(operation, url).await?;
        Ok(body.onto_data.into_summary(ontology))
    }

    async fn embed(&self, ontology: &str, algorithm: &str) -> BackendResult<StageAck> {
        let operation = "embed";
        let mut url = self.endpoint(operation, &["api", "embed", ontology])?;
        url.query_pairs_mut().append_pair("algo", algorithm);
        let body: MessageBody = self.get_json(operation, url).await?;
        Ok(StageAck {
            message: body.message,
        })
    }

    async fn evaluate(&self, key: &EvaluationKey) -> BackendResult<EvaluateOutput> {
        let operation = "evaluate";
        let url = self.endpoint(
            operation,
            &[
                "api",
                "evaluate",
                key.ontology.as_str(),
                key.algorithm.as_str(),
                key.classifier.as_str(),
            ],
        )?;
        let body: EvaluationBody = self.get_json(operation, url).await?;
        Ok(body.into_output())
    }

    async fn evaluation_stats(&self, key: &EvaluationKey) -> BackendResult<EvaluationReport> {
        let operation = "evaluation stats";
        let url = self.endpoint(
            operation,
            &[
                "api",
                "evaluate",
                key.ontology.as_str(),
                key.algorithm.as_str(),
                key.classifier.as_str(),
                "stat",
            ],
        )?;
        let body: EvaluationBody = self.get_json(operation, url).await?;
        Ok(body.into_output().report)
    }
}
