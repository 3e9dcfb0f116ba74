use super::{InferenceEngine, InputKind, ModelLoader};
use crate::errors::{InferenceError, LoadError};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use schema::TensorBuffer;
use std::path::PathBuf;

const INTRA_THREADS: usize = 4;

/// ONNX Runtime session running the leaf classifier on the CPU provider.
pub struct OrtEngine {
    session: Session,
    input_name: String,
    input_kind: InputKind,
}

impl OrtEngine {
    pub fn load(path: &str, input_name: &str, input_kind: InputKind) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(INTRA_THREADS)?
            .commit_from_file(path)?;

        tracing::info!(path, input_name, input_kind = %input_kind, "Model loaded");

        Ok(Self {
            session,
            input_name: input_name.to_string(),
            input_kind,
        })
    }

    fn run(&mut self, input: &TensorBuffer) -> anyhow::Result<Vec<f32>> {
        let outputs = match self.input_kind {
            InputKind::U8 => self.session.run(ort::inputs![
                self.input_name.as_str() => TensorRef::from_array_view(input.view())?
            ])?,
            InputKind::F32 => {
                let unit = input.to_unit_f32();
                self.session.run(ort::inputs![
                    self.input_name.as_str() => TensorRef::from_array_view(unit.view())?
                ])?
            }
        };

        let scores = outputs[0].try_extract_array::<f32>()?;
        Ok(scores.iter().copied().collect())
    }
}

impl InferenceEngine for OrtEngine {
    fn classify(&mut self, input: &TensorBuffer) -> Result<Vec<f32>, InferenceError> {
        self.run(input)
            .map_err(|e| InferenceError::Engine(format!("{:#}", e)))
    }
}

/// Loads an [`OrtEngine`] from a model file on disk.
#[derive(Debug, Clone)]
pub struct OrtLoader {
    pub path: PathBuf,
    pub input_name: String,
    pub input_kind: InputKind,
}

impl ModelLoader for OrtLoader {
    fn load(&self) -> Result<Box<dyn InferenceEngine>, LoadError> {
        if !self.path.exists() {
            return Err(LoadError::NotFound(self.path.clone()));
        }

        let path = self.path.to_string_lossy();
        let engine = OrtEngine::load(&path, &self.input_name, self.input_kind)
            .map_err(|e| LoadError::Backend(format!("{:#}", e)))?;

        Ok(Box::new(engine))
    }
}
