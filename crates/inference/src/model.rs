//! Model lifecycle: load the engine once per process and hand out a shared
//! handle to it.

use crate::backend::{InferenceEngine, ModelLoader};
use crate::errors::LoadError;
use opentelemetry::{global, metrics::Histogram};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Ready => "ready",
            ModelState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Shared reference to a loaded engine.
///
/// Cloning is cheap. Every physical engine call goes through the inner mutex,
/// so at most one invocation runs at a time across all clones.
#[derive(Clone)]
pub struct ModelHandle {
    engine: Arc<Mutex<Box<dyn InferenceEngine>>>,
}

impl ModelHandle {
    pub fn new(engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn from_engine(engine: impl InferenceEngine + 'static) -> Self {
        Self::new(Box::new(engine))
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn InferenceEngine) -> R) -> R {
        let mut engine = self.engine.lock();
        f(engine.as_mut())
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("refs", &Arc::strong_count(&self.engine))
            .finish()
    }
}

/// Outcome broadcast to everyone waiting on one load attempt.
type LoadOutcome = Option<Result<ModelHandle, LoadError>>;

struct Slot {
    state: ModelState,
    handle: Option<ModelHandle>,
    /// Completed load attempts.
    attempts: u64,
    /// Present while a load task is running.
    in_flight: Option<watch::Receiver<LoadOutcome>>,
}

struct Shared {
    loader: Arc<dyn ModelLoader>,
    slot: Mutex<Slot>,
    load_duration: Histogram<f64>,
}

impl Shared {
    /// Mark the slot `Loading` and start a load task.
    ///
    /// The task owns the attempt: it records the outcome in the slot even if
    /// every caller has stopped waiting.
    fn start_load(self: &Arc<Self>, slot: &mut Slot) -> watch::Receiver<LoadOutcome> {
        let (tx, rx) = watch::channel(None);

        tracing::info!(from = %slot.state, to = %ModelState::Loading, "Model state transition");
        slot.state = ModelState::Loading;
        slot.in_flight = Some(rx.clone());

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let start = Instant::now();
            let loader = Arc::clone(&shared.loader);
            let result = match tokio::task::spawn_blocking(move || loader.load()).await {
                Ok(result) => result,
                Err(e) => Err(LoadError::Aborted(e.to_string())),
            };
            shared.load_duration.record(start.elapsed().as_secs_f64(), &[]);

            let outcome = shared.finish(result, start);
            tx.send_replace(Some(outcome));
        });

        rx
    }

    fn finish(
        &self,
        result: Result<Box<dyn InferenceEngine>, LoadError>,
        start: Instant,
    ) -> Result<ModelHandle, LoadError> {
        let mut slot = self.slot.lock();
        slot.attempts += 1;
        slot.in_flight = None;

        match result {
            Ok(engine) => {
                let handle = ModelHandle::new(engine);
                slot.handle = Some(handle.clone());
                slot.state = ModelState::Ready;
                tracing::info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model ready"
                );
                Ok(handle)
            }
            Err(err) => {
                slot.state = ModelState::Failed(err.to_string());
                tracing::error!(error = %err, attempt = slot.attempts, "Model load failed");
                Err(err)
            }
        }
    }
}

/// Owns the single model load of the process.
///
/// At most one physical load runs at a time. `Failed` is terminal until a
/// caller invokes [`load`](Self::load) again; there is no automatic retry.
pub struct ModelManager {
    shared: Arc<Shared>,
}

impl ModelManager {
    pub fn new(loader: impl ModelLoader) -> Self {
        let meter = global::meter("inference");
        let load_duration = meter
            .f64_histogram("model_load_duration_seconds")
            .with_description("Time to load the classifier model")
            .with_unit("s")
            .with_boundaries(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
            .build();

        Self {
            shared: Arc::new(Shared {
                loader: Arc::new(loader),
                slot: Mutex::new(Slot {
                    state: ModelState::Unloaded,
                    handle: None,
                    attempts: 0,
                    in_flight: None,
                }),
                load_duration,
            }),
        }
    }

    pub fn state(&self) -> ModelState {
        self.shared.slot.lock().state.clone()
    }

    /// The handle, only when the model is `Ready`.
    pub fn handle(&self) -> Option<ModelHandle> {
        self.shared.slot.lock().handle.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.slot.lock().state == ModelState::Ready
    }

    /// Return the loaded handle, loading the model first if needed.
    ///
    /// Callers arriving while a load is in progress wait for it and receive
    /// its outcome, success or failure. Dropping the returned future does not
    /// abort the load.
    pub async fn load(&self) -> Result<ModelHandle, LoadError> {
        let mut outcome = {
            let mut slot = self.shared.slot.lock();
            if let Some(handle) = &slot.handle {
                return Ok(handle.clone());
            }
            // A closed channel means the load task died with its runtime.
            let joinable = slot
                .in_flight
                .as_ref()
                .filter(|rx| rx.has_changed().is_ok())
                .cloned();
            match joinable {
                Some(rx) => {
                    tracing::debug!("Joining model load in progress");
                    rx
                }
                None => self.shared.start_load(&mut slot),
            }
        };

        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| {
                LoadError::Aborted("model load task ended without a result".to_string())
            })?;

        match &*finished {
            Some(result) => result.clone(),
            None => Err(LoadError::Aborted("model load produced no outcome".to_string())),
        }
    }
}
