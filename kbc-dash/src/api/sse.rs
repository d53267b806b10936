//! Server-Sent Events for dashboard updates

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
///
/// Streams NotificationAppended, PhaseChanged, SelectionChanged,
/// DisplayUpdated and OntologyListUpdated. Clients re-read
/// `/api/session` for the full state.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    kbc_common::sse::dashboard_event_stream(&state.event_bus, "kbc-dash")
}
