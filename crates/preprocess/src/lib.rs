pub mod cpu;

use schema::{PixelFormat, RawFrame, TensorBuffer, TensorShapeError};

pub use cpu::CpuPreProcessor;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("frame has zero dimensions ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },

    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    #[error("buffer size mismatch: expected {expected}, got {actual} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("resize failed: {0}")]
    Resize(String),

    #[error(transparent)]
    Tensor(#[from] TensorShapeError),
}

/// Converts a camera frame into the fixed-shape model input.
pub trait Preprocess {
    fn preprocess(&mut self, frame: &RawFrame) -> Result<TensorBuffer, PreprocessError>;
}
