use opentelemetry::{
    global,
    metrics::{Counter, Meter},
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live-mode frame accounting, exported through OpenTelemetry and kept
/// locally for status logs.
pub struct PipelineMetrics {
    frames_counter: Counter<u64>,
    dropped_counter: Counter<u64>,
    errors_counter: Counter<u64>,
    frames: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    published: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub frames: u64,
    pub dropped: u64,
    pub errors: u64,
    pub published: u64,
}

fn init_counters(meter: &Meter) -> (Counter<u64>, Counter<u64>, Counter<u64>) {
    let frames_counter = meter
        .u64_counter("diagnosis_frames_total")
        .with_description("Frames delivered to live analysis")
        .build();
    let dropped_counter = meter
        .u64_counter("diagnosis_frames_dropped_total")
        .with_description("Frames dropped because an analysis was already in flight")
        .build();
    let errors_counter = meter
        .u64_counter("diagnosis_frame_errors_total")
        .with_description("Frames whose analysis failed")
        .build();

    (frames_counter, dropped_counter, errors_counter)
}

impl PipelineMetrics {
    pub fn new() -> Self {
        let (frames_counter, dropped_counter, errors_counter) =
            init_counters(&global::meter("controller"));

        Self {
            frames_counter,
            dropped_counter,
            errors_counter,
            frames: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    pub fn frame_received(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.frames_counter.add(1, &[]);
    }

    pub fn frame_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.dropped_counter.add(1, &[]);
    }

    pub fn frame_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.errors_counter.add(1, &[]);
    }

    pub fn result_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameStats {
        FrameStats {
            frames: self.frames.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
