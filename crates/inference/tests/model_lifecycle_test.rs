use inference::{
    InferenceEngine, InferenceError, LoadError, ModelHandle, ModelLoader, ModelManager,
    ModelState, infer,
};
use schema::TensorBuffer;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Engine that records how many calls overlap.
struct Overlap {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl InferenceEngine for Overlap {
    fn classify(&mut self, _input: &TensorBuffer) -> Result<Vec<f32>, InferenceError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![0.7, 0.1, 0.1, 0.1])
    }
}

/// Loader that takes a while and may fail.
struct SlowLoader {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    fail: bool,
}

impl ModelLoader for SlowLoader {
    fn load(&self) -> Result<Box<dyn InferenceEngine>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if self.fail {
            return Err(LoadError::NotFound("/models/missing.onnx".into()));
        }
        Ok(Box::new(Overlap {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }))
    }
}

fn slow_manager(fail: bool) -> (Arc<ModelManager>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = ModelManager::new(SlowLoader {
        calls: Arc::clone(&calls),
        delay: Duration::from_millis(100),
        fail,
    });
    (Arc::new(manager), calls)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_load() {
    let (manager, calls) = slow_manager(false);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.load().await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.state(), ModelState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiters_of_failed_load_receive_the_failure() {
    let (manager, calls) = slow_manager(true);

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.load().await })
    };

    // Let the first caller enter the loader before the others arrive
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.state(), ModelState::Loading);

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.load().await })
        })
        .collect();

    let expected = LoadError::NotFound("/models/missing.onnx".into());
    assert_eq!(first.await.unwrap().unwrap_err(), expected);
    for waiter in waiters {
        assert_eq!(waiter.await.unwrap().unwrap_err(), expected);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(manager.state(), ModelState::Failed(_)));
}

#[test]
fn engine_calls_are_serialized_across_handle_clones() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let handle = ModelHandle::from_engine(Overlap {
        active: Arc::clone(&active),
        peak: Arc::clone(&peak),
    });
    let tensor = TensorBuffer::from_rgb(vec![0u8; 128 * 128 * 3]).unwrap();

    thread::scope(|scope| {
        for _ in 0..6 {
            let handle = handle.clone();
            let tensor = &tensor;
            scope.spawn(move || {
                for _ in 0..5 {
                    infer(&handle, tensor).unwrap();
                }
            });
        }
    });

    assert_eq!(peak.load(Ordering::SeqCst), 1);
}
