use crate::error::AnalysisError;
use common::span_debug;
use inference::{InferenceError, ModelHandle, ModelManager, classify, infer};
use knowledge::Enricher;
use parking_lot::Mutex;
use preprocess::{CpuPreProcessor, Preprocess};
use schema::{DiagnosisResult, Prediction, ProbabilityVector, RawFrame, SourceMode};
use std::sync::Arc;

/// Stages shared by discrete and live analysis: model, preprocessor, engine
/// invocation, classification and enrichment.
pub struct Pipeline {
    model: Arc<ModelManager>,
    preprocessor: Arc<Mutex<CpuPreProcessor>>,
    enricher: Arc<Enricher>,
}

impl Pipeline {
    pub fn new(model: Arc<ModelManager>, enricher: Enricher) -> Self {
        Self {
            model,
            preprocessor: Arc::new(Mutex::new(CpuPreProcessor::new())),
            enricher: Arc::new(enricher),
        }
    }

    /// Load the model if needed. A failed model is retried only through
    /// this call.
    pub async fn load_model(&self) -> Result<ModelHandle, AnalysisError> {
        Ok(self.model.load().await?)
    }

    /// The handle if the model is already `Ready`; never triggers a load.
    pub fn ready_model(&self) -> Result<ModelHandle, AnalysisError> {
        self.model
            .handle()
            .ok_or_else(|| AnalysisError::ModelNotReady(self.model.state()))
    }

    /// Preprocess, infer, classify and enrich one frame, waiting for the
    /// knowledge store up to the enrichment timeout.
    #[tracing::instrument(skip_all, fields(frame = frame.frame_number, mode = ?source_mode))]
    pub async fn analyze_frame(
        &self,
        handle: ModelHandle,
        frame: RawFrame,
        source_mode: SourceMode,
    ) -> Result<DiagnosisResult, AnalysisError> {
        let prediction = self.classify_frame(handle, frame).await?;
        Ok(self.enricher.enrich(prediction, source_mode).await)
    }

    /// Like [`analyze_frame`](Self::analyze_frame) but enriches from cached
    /// records only, so the caller never waits on the knowledge store.
    #[tracing::instrument(skip_all, fields(frame = frame.frame_number))]
    pub async fn analyze_live_frame(
        &self,
        handle: ModelHandle,
        frame: RawFrame,
    ) -> Result<DiagnosisResult, AnalysisError> {
        let prediction = self.classify_frame(handle, frame).await?;
        Ok(self.enricher.enrich_cached(prediction, SourceMode::Live))
    }

    async fn classify_frame(
        &self,
        handle: ModelHandle,
        frame: RawFrame,
    ) -> Result<Prediction, AnalysisError> {
        let probs = self.score(handle, frame).await?;
        let prediction = classify(&probs);

        tracing::debug!(
            class = %prediction.class,
            confidence = prediction.confidence,
            "Frame classified"
        );

        Ok(prediction)
    }

    /// Preprocessing and the engine call both run on the blocking pool.
    async fn score(
        &self,
        handle: ModelHandle,
        frame: RawFrame,
    ) -> Result<ProbabilityVector, AnalysisError> {
        let preprocessor = Arc::clone(&self.preprocessor);

        tokio::task::spawn_blocking(move || -> Result<ProbabilityVector, AnalysisError> {
            let _s = span_debug!("score_frame");
            let tensor = preprocessor.lock().preprocess(&frame)?;
            Ok(infer(&handle, &tensor)?)
        })
        .await
        .map_err(|e| AnalysisError::Inference(InferenceError::Aborted(e.to_string())))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference::{InferenceEngine, LoadError, ModelLoader, ModelState};
    use knowledge::{DEFAULT_ENRICHMENT_TIMEOUT, StaticKnowledgeStore};
    use schema::{ClassIdentity, PixelFormat, TensorBuffer};

    struct Fixed;

    impl InferenceEngine for Fixed {
        fn classify(&mut self, _input: &TensorBuffer) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.3, 0.3, 0.3, 0.1])
        }
    }

    struct FixedLoader;

    impl ModelLoader for FixedLoader {
        fn load(&self) -> Result<Box<dyn InferenceEngine>, LoadError> {
            Ok(Box::new(Fixed))
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            Arc::new(ModelManager::new(FixedLoader)),
            Enricher::new(
                Arc::new(StaticKnowledgeStore::new()),
                DEFAULT_ENRICHMENT_TIMEOUT,
            ),
        )
    }

    #[tokio::test]
    async fn ready_model_never_loads() {
        let pipeline = pipeline();

        let err = pipeline.ready_model().unwrap_err();
        assert!(matches!(err, AnalysisError::ModelNotReady(ModelState::Unloaded)));

        pipeline.load_model().await.unwrap();
        assert!(pipeline.ready_model().is_ok());
    }

    #[tokio::test]
    async fn tie_picks_first_class_with_low_severity() {
        let pipeline = pipeline();
        let handle = pipeline.load_model().await.unwrap();
        let frame = RawFrame::new(7, 32, 32, PixelFormat::Rgb8, vec![128; 32 * 32 * 3]);

        let result = pipeline
            .analyze_frame(handle, frame, SourceMode::Captured)
            .await
            .unwrap();

        assert_eq!(result.prediction.class, ClassIdentity::AppleScab);
        assert_eq!(result.severity, Some(schema::SeverityLevel::Low));
        assert_eq!(result.disease_record, None);
    }

    #[tokio::test]
    async fn malformed_frame_is_a_preprocess_error() {
        let pipeline = pipeline();
        let handle = pipeline.load_model().await.unwrap();
        let frame = RawFrame::new(0, 32, 32, PixelFormat::Rgb8, vec![0; 10]);

        let err = pipeline
            .analyze_frame(handle, frame, SourceMode::Live)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Preprocess(_)));
    }
}
