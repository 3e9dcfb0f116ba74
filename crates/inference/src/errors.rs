use schema::{ProbabilityError, TensorShapeError};
use std::path::PathBuf;

/// Model failed to load. Terminal until a caller explicitly retries.
///
/// `Clone` so every waiter of a failed load receives the same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("backend failed to load model: {0}")]
    Backend(String),

    #[error("model load task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("invalid input tensor: {0}")]
    TensorShape(#[from] TensorShapeError),

    #[error("engine failure: {0}")]
    Engine(String),

    #[error("engine returned {actual} scores, expected {expected}")]
    OutputLength { expected: usize, actual: usize },

    #[error("malformed engine output: {0}")]
    MalformedOutput(ProbabilityError),

    #[error("inference task aborted: {0}")]
    Aborted(String),
}

impl From<ProbabilityError> for InferenceError {
    fn from(err: ProbabilityError) -> Self {
        match err {
            ProbabilityError::Length { expected, actual } => {
                InferenceError::OutputLength { expected, actual }
            }
            other => InferenceError::MalformedOutput(other),
        }
    }
}
