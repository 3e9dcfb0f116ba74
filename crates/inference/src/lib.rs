pub mod backend;
pub mod errors;
pub mod invoker;
pub mod model;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceEngine, InputKind, ModelLoader};
pub use errors::{InferenceError, LoadError};
pub use invoker::{infer, infer_async};
pub use model::{ModelHandle, ModelManager, ModelState};
pub use processing::post::{classify, severity_for};

#[cfg(feature = "ort-backend")]
pub use backend::ort::{OrtEngine, OrtLoader};
