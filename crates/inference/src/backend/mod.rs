use crate::errors::{InferenceError, LoadError};
use schema::TensorBuffer;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Opaque numeric function: one image tensor in, one score per taxonomy class out.
///
/// Implementations are never called concurrently; the owning [`ModelHandle`]
/// serializes access.
///
/// [`ModelHandle`]: crate::model::ModelHandle
pub trait InferenceEngine: Send {
    fn classify(&mut self, input: &TensorBuffer) -> Result<Vec<f32>, InferenceError>;
}

/// Builds an engine. Runs on the blocking thread pool, so it may do file I/O
/// and graph optimization directly.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self) -> Result<Box<dyn InferenceEngine>, LoadError>;
}

/// Value range the model was exported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputKind {
    /// Raw `u8` channel values, 0..=255.
    #[default]
    U8,
    /// `f32` scaled to `[0, 1]`.
    F32,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::U8 => "u8",
            InputKind::F32 => "f32",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Ok(InputKind::U8),
            "f32" | "float" | "float32" => Ok(InputKind::F32),
            other => Err(format!("unknown model input kind '{}'", other)),
        }
    }
}
