use crate::error::AnalysisError;
use crate::mailbox::LatestResult;
use crate::metrics::{FrameStats, PipelineMetrics};
use crate::pipeline::Pipeline;
use capture::{CaptureError, FrameSource};
use schema::RawFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;

/// Capture failures in a row tolerated before live mode gives up.
const MAX_CONSECUTIVE_CAPTURE_ERRORS: u32 = 10;

/// How often `settle` re-checks the busy flag.
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame claimed the pipeline and is being analyzed.
    Accepted,
    /// An analysis was already in flight; the frame was discarded.
    Dropped,
}

/// Releases the busy flag when the spawned analysis ends, including by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Continuous analysis of a live preview with at most one frame in flight.
///
/// `on_frame` never waits on the engine, and analysis never waits on the
/// knowledge store: records come from the enricher's cache. Completed results
/// land in the `LatestResult` mailbox; per-frame failures are logged and
/// counted only.
pub struct LiveAnalyzer {
    pipeline: Arc<Pipeline>,
    busy: Arc<AtomicBool>,
    mailbox: LatestResult,
    metrics: Arc<PipelineMetrics>,
    runtime: Handle,
}

impl LiveAnalyzer {
    pub fn new(pipeline: Arc<Pipeline>, mailbox: LatestResult, runtime: Handle) -> Self {
        Self {
            pipeline,
            busy: Arc::new(AtomicBool::new(false)),
            mailbox,
            metrics: Arc::new(PipelineMetrics::new()),
            runtime,
        }
    }

    pub fn mailbox(&self) -> &LatestResult {
        &self.mailbox
    }

    pub fn stats(&self) -> FrameStats {
        self.metrics.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Frame callback. Returns immediately in both outcomes.
    pub fn on_frame(&self, frame: RawFrame) -> FrameOutcome {
        self.metrics.frame_received();

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.metrics.frame_dropped();
            tracing::trace!(frame = frame.frame_number, "Analysis in flight, frame dropped");
            return FrameOutcome::Dropped;
        }

        let guard = BusyGuard(Arc::clone(&self.busy));
        let pipeline = Arc::clone(&self.pipeline);
        let mailbox = self.mailbox.clone();
        let metrics = Arc::clone(&self.metrics);

        self.runtime.spawn(async move {
            let _guard = guard;
            let frame_number = frame.frame_number;

            let outcome = match pipeline.ready_model() {
                Ok(handle) => pipeline.analyze_live_frame(handle, frame).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(result) => {
                    let sequence = mailbox.publish(result);
                    metrics.result_published();
                    tracing::debug!(frame = frame_number, sequence, "Live result published");
                }
                Err(e @ AnalysisError::ModelNotReady(_)) => {
                    metrics.frame_error();
                    tracing::debug!(frame = frame_number, error = %e, "Frame skipped");
                }
                Err(e) => {
                    metrics.frame_error();
                    tracing::warn!(frame = frame_number, error = %e, "Live analysis failed");
                }
            }
        });

        FrameOutcome::Accepted
    }

    /// Pull frames from `source` until `shutdown` is raised or the source ends.
    ///
    /// Blocks the calling thread; analysis work runs on the runtime.
    pub fn run<S>(&self, source: &mut S, shutdown: &AtomicBool) -> Result<FrameStats, CaptureError>
    where
        S: FrameSource + ?Sized,
    {
        let mut consecutive_errors = 0u32;

        tracing::info!("Live analysis started");

        while !shutdown.load(Ordering::Relaxed) {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    self.on_frame(frame);
                }
                Ok(None) => {
                    tracing::info!("Frame source ended");
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(
                        error = %e,
                        consecutive_errors,
                        "Frame capture failed"
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_CAPTURE_ERRORS {
                        return Err(e);
                    }
                }
            }
        }

        let stats = self.stats();
        tracing::info!(
            frames = stats.frames,
            dropped = stats.dropped,
            errors = stats.errors,
            published = stats.published,
            "Live analysis stopped"
        );
        Ok(stats)
    }

    /// Wait until no analysis is in flight.
    pub async fn settle(&self) {
        while self.is_busy() {
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }
    }
}
