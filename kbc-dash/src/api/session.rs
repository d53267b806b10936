//! Session API handlers
//!
//! GET /api/session, GET /api/notifications, GET /api/catalog,
//! POST /api/ontologies/refresh, POST /api/upload,
//! POST /api/ontologies/:name/extract, POST /api/run,
//! PUT /api/selection, PUT /api/garbage/:index

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{
    error::{ApiError, ApiResult},
    models::{CatalogEntry, Notification, OntologyFile, SelectionUpdate, ALGORITHMS, CLASSIFIERS},
    session::{QueryOutcome, SessionSnapshot, StageOutcome},
    AppState,
};

/// POST /api/upload request
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// Local path of the ontology file
    pub file_path: PathBuf,
    pub ontology_name: String,
    pub alias: String,
}

/// Response of stage-triggering endpoints
#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub outcome: StageOutcome,
    pub session: SessionSnapshot,
}

/// PUT /api/selection response
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub outcome: QueryOutcome,
    pub session: SessionSnapshot,
}

/// GET /api/catalog response
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub algorithms: &'static [CatalogEntry],
    pub classifiers: &'static [CatalogEntry],
}

#[derive(Debug, Serialize)]
pub struct OntologyListResponse {
    pub ontologies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GarbageSelectionResponse {
    pub garbage_index: Option<usize>,
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.orchestrator.snapshot().await)
}

/// GET /api/notifications
///
/// Newest first, matching the dashboard feed order.
pub async fn get_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    let mut notifications = state.orchestrator.notifications().await;
    notifications.reverse();
    Json(notifications)
}

/// GET /api/catalog
pub async fn get_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        algorithms: ALGORITHMS,
        classifiers: CLASSIFIERS,
    })
}

/// POST /api/ontologies/refresh
pub async fn refresh_ontologies(State(state): State<AppState>) -> Json<OntologyListResponse> {
    let ontologies = state.orchestrator.refresh_ontology_list().await;
    Json(OntologyListResponse { ontologies })
}

/// POST /api/upload
///
/// Reads the file from local disk, then runs Upload → Extract. Validation
/// and backend failures are reported through the notification feed, so the
/// response is 200 with the outcome unless the file cannot be read.
pub async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<StageResponse>> {
    let bytes = tokio::fs::read(&request.file_path).await.map_err(|e| {
        ApiError::BadRequest(format!(
            "Cannot read ontology file {}: {}",
            request.file_path.display(),
            e
        ))
    })?;

    let file_name = request
        .file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.owl", request.ontology_name));

    let outcome = state
        .orchestrator
        .upload(
            OntologyFile::new(file_name, bytes),
            &request.ontology_name,
            &request.alias,
        )
        .await;

    Ok(Json(StageResponse {
        outcome,
        session: state.orchestrator.snapshot().await,
    }))
}

/// POST /api/ontologies/:name/extract
pub async fn extract(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<StageResponse>> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("Ontology name is empty".to_string()));
    }

    let outcome = state.orchestrator.extract(name.trim()).await;
    Ok(Json(StageResponse {
        outcome,
        session: state.orchestrator.snapshot().await,
    }))
}

/// POST /api/run
pub async fn run(State(state): State<AppState>) -> Json<StageResponse> {
    let outcome = state.orchestrator.run().await;
    Json(StageResponse {
        outcome,
        session: state.orchestrator.snapshot().await,
    })
}

/// PUT /api/selection
pub async fn update_selection(
    State(state): State<AppState>,
    Json(update): Json<SelectionUpdate>,
) -> Json<SelectionResponse> {
    let outcome = state.orchestrator.update_selection(update).await;
    Json(SelectionResponse {
        outcome,
        session: state.orchestrator.snapshot().await,
    })
}

/// PUT /api/garbage/:index
pub async fn select_garbage(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Json<GarbageSelectionResponse> {
    let garbage_index = state.orchestrator.select_garbage(index).await;
    Json(GarbageSelectionResponse { garbage_index })
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/notifications", get(get_notifications))
        .route("/api/catalog", get(get_catalog))
        .route("/api/ontologies/refresh", post(refresh_ontologies))
        .route("/api/ontologies/:name/extract", post(extract))
        .route("/api/upload", post(upload))
        .route("/api/run", post(run))
        .route("/api/selection", put(update_selection))
        .route("/api/garbage/:index", put(select_garbage))
}
