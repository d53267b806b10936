//! # KBC Ops Common Library
//!
//! Shared code for the knowledge-base-completion dashboard including:
//! - Error types
//! - Configuration loading and resolution
//! - Dashboard event vocabulary (DashboardEvent, SessionPhase) and EventBus
//! - SSE stream helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
