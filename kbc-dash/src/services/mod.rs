//! External collaborators

pub mod backend_client;

pub use backend_client::{
    BackendError, BackendResult, EvaluateOutput, ExtractOutput, HttpBackend, KbcBackend,
    StageAck, UploadAck,
};
