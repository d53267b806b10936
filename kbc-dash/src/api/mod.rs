//! HTTP facade over one evaluation session
//!
//! Thin JSON + SSE adapter so a view layer can observe and drive the
//! orchestrator. Layout and navigation live in the view, not here.

pub mod health;
pub mod session;
pub mod sse;

pub use health::health_routes;
pub use session::session_routes;
pub use sse::event_stream;
