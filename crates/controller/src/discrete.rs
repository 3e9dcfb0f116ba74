use crate::error::AnalysisError;
use crate::pipeline::Pipeline;
use crate::state_machine::{AnalysisRun, AnalysisState};
use capture::{CaptureError, FrameSource};
use parking_lot::Mutex;
use schema::{DiagnosisResult, SourceMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Caller-side handle for abandoning a discrete analysis.
///
/// Cancelling drops interest only: an engine call already running finishes
/// and its result is discarded.
#[derive(Clone, Default)]
pub struct CancellationHandle {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Frame source handed to the blocking pool for one-shot captures.
pub type SharedSource<S> = Arc<Mutex<S>>;

/// One-shot analysis of a captured photo.
pub struct DiscreteAnalyzer {
    pipeline: Arc<Pipeline>,
    timeout: Duration,
    last_state: Mutex<AnalysisState>,
}

impl DiscreteAnalyzer {
    pub fn new(pipeline: Arc<Pipeline>, timeout: Duration) -> Self {
        Self {
            pipeline,
            timeout,
            last_state: Mutex::new(AnalysisState::Idle),
        }
    }

    /// Terminal state of the most recent `analyze` call.
    pub fn last_state(&self) -> AnalysisState {
        *self.last_state.lock()
    }

    /// Capture, preprocess, infer, classify and enrich one photo.
    ///
    /// Every failure is returned; retrying means calling `analyze` again,
    /// which also retries a model that previously failed to load. The
    /// capture runs on the blocking pool, so a stalled camera still honours
    /// the timeout and cancellation.
    pub async fn analyze<S>(
        &self,
        source: &SharedSource<S>,
        cancel: &CancellationHandle,
    ) -> Result<DiagnosisResult, AnalysisError>
    where
        S: FrameSource + Send + 'static,
    {
        let mut run = AnalysisRun::new();

        let outcome = if cancel.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
                res = tokio::time::timeout(self.timeout, self.run_stages(&mut run, source)) => {
                    res.unwrap_or(Err(AnalysisError::Timeout(self.timeout)))
                }
            }
        };

        if outcome.is_err() && !run.current_state().is_terminal() {
            run.advance(AnalysisState::Failed)?;
        }
        *self.last_state.lock() = run.current_state();

        match &outcome {
            Ok(result) => tracing::info!(
                class = %result.prediction.class,
                confidence = result.prediction.confidence,
                enriched = result.is_enriched(),
                elapsed_ms = run.elapsed().as_millis() as u64,
                "Discrete analysis done"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                elapsed_ms = run.elapsed().as_millis() as u64,
                "Discrete analysis failed"
            ),
        }

        outcome
    }

    async fn run_stages<S>(
        &self,
        run: &mut AnalysisRun,
        source: &SharedSource<S>,
    ) -> Result<DiagnosisResult, AnalysisError>
    where
        S: FrameSource + Send + 'static,
    {
        run.advance(AnalysisState::Preparing)?;
        let handle = self.pipeline.load_model().await?;

        let source = Arc::clone(source);
        let frame = tokio::task::spawn_blocking(move || source.lock().capture())
            .await
            .map_err(|e| CaptureError::Device(format!("capture task failed: {e}")))??;

        run.advance(AnalysisState::Analyzing)?;
        let result = self
            .pipeline
            .analyze_frame(handle, frame, SourceMode::Captured)
            .await?;

        run.advance(AnalysisState::Done)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let handle = CancellationHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        handle.cancel();

        task.await.unwrap();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_is_immediate_when_already_cancelled() {
        let handle = CancellationHandle::new();
        handle.cancel();
        handle.cancelled().await;
    }
}
