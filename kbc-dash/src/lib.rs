//! kbc-dash library interface
//!
//! Session orchestrator for the knowledge-base-completion dashboard plus the
//! HTTP facade view layers talk to. Exposed as a library for integration
//! testing and for embedding the orchestrator in other front ends.

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use kbc_common::events::EventBus;
use session::SessionOrchestrator;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
    /// Same bus the orchestrator publishes on
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    pub backend_uri: String,
}

impl AppState {
    pub fn new(orchestrator: SessionOrchestrator, backend_uri: impl Into<String>) -> Self {
        Self {
            event_bus: orchestrator.event_bus().clone(),
            orchestrator,
            startup_time: Utc::now(),
            backend_uri: backend_uri.into(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::session_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
