//! Evaluation session: display store and orchestrator

pub mod display_state;
pub mod orchestrator;

pub use display_state::{DisplayState, DisplayTransition};
pub use orchestrator::{QueryOutcome, SessionOrchestrator, SessionSnapshot, StageOutcome};
