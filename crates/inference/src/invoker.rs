use crate::errors::InferenceError;
use crate::model::ModelHandle;
use opentelemetry::{global, metrics::Histogram};
use schema::{ProbabilityVector, TensorBuffer};
use std::sync::LazyLock;
use std::time::Instant;

static INFERENCE_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    let latency_buckets = [
        0.001, 0.002, 0.005, 0.007, 0.01, 0.015, 0.02, 0.025, 0.03, 0.04, 0.05, 0.075, 0.1, 0.15,
        0.2, 0.5,
    ];
    global::meter("inference")
        .f64_histogram("inference_duration_seconds")
        .with_description("Time spent inside a single engine call")
        .with_unit("s")
        .with_boundaries(latency_buckets.to_vec())
        .build()
});

/// Run the engine on one tensor and validate what comes back.
///
/// Blocks the calling thread for the engine call and for any call already
/// holding the engine. Use [`infer_async`] from async contexts.
#[tracing::instrument(skip_all)]
pub fn infer(
    handle: &ModelHandle,
    tensor: &TensorBuffer,
) -> Result<ProbabilityVector, InferenceError> {
    tensor.validate()?;

    let start = Instant::now();
    let scores = handle.with_engine(|engine| engine.classify(tensor))?;
    let elapsed = start.elapsed();
    INFERENCE_DURATION.record(elapsed.as_secs_f64(), &[]);

    tracing::trace!(
        elapsed_us = elapsed.as_micros() as u64,
        scores = ?scores,
        "Engine call complete"
    );

    Ok(ProbabilityVector::try_from(scores)?)
}

/// [`infer`] on the blocking thread pool.
pub async fn infer_async(
    handle: ModelHandle,
    tensor: TensorBuffer,
) -> Result<ProbabilityVector, InferenceError> {
    tokio::task::spawn_blocking(move || infer(&handle, &tensor))
        .await
        .map_err(|e| InferenceError::Aborted(e.to_string()))?
}
