use crate::state_machine::InvalidTransition;
use capture::CaptureError;
use inference::{InferenceError, LoadError, ModelState};
use preprocess::PreprocessError;
use std::time::Duration;

/// Everything a discrete analysis can report to its caller.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("model unavailable: {0}")]
    Load(#[from] LoadError),

    #[error("model not ready (state: {0})")]
    ModelNotReady(ModelState),

    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    State(#[from] InvalidTransition),
}
