use crate::KnowledgeStore;
use crate::errors::EnrichmentError;
use inference::severity_for;
use opentelemetry::{KeyValue, global, metrics::Counter};
use parking_lot::{Mutex, RwLock};
use schema::{ClassIdentity, DiagnosisResult, DiseaseRecord, Prediction, SourceMode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DEFAULT_ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Merges model predictions with knowledge-store records.
///
/// Lookups are bounded by `timeout`; every failure degrades to a result with
/// model-only data. Records found are kept per class, so each disease is
/// fetched from the store at most once successfully.
pub struct Enricher {
    store: Arc<dyn KnowledgeStore>,
    timeout: Duration,
    records: RwLock<HashMap<ClassIdentity, DiseaseRecord>>,
    /// Classes with a background fetch running.
    fetching: Mutex<HashSet<ClassIdentity>>,
    failures: AtomicU64,
    failures_counter: Counter<u64>,
}

impl Enricher {
    pub fn new(store: Arc<dyn KnowledgeStore>, timeout: Duration) -> Self {
        let failures_counter = global::meter("knowledge")
            .u64_counter("enrichment_failures_total")
            .with_description("Disease record lookups that produced no record")
            .build();

        Self {
            store,
            timeout,
            records: RwLock::new(HashMap::new()),
            fetching: Mutex::new(HashSet::new()),
            failures: AtomicU64::new(0),
            failures_counter,
        }
    }

    /// Lookups that ended without a record since construction.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Merge the record for `prediction`, asking the store when it is not
    /// cached yet. Waits at most `timeout`.
    #[tracing::instrument(skip_all, fields(class = %prediction.class, mode = ?source_mode))]
    pub async fn enrich(&self, prediction: Prediction, source_mode: SourceMode) -> DiagnosisResult {
        let severity = severity_for(&prediction);

        let record = if prediction.is_healthy() {
            None
        } else if let Some(record) = self.cached(prediction.class) {
            Some(record)
        } else {
            self.lookup(prediction.class).await
        };

        DiagnosisResult::new(prediction, severity, record, source_mode)
    }

    /// Merge the cached record for `prediction` without waiting on the store.
    ///
    /// A cache miss starts a background fetch for the class, so a later call
    /// finds the record. Must be called from within a Tokio runtime.
    pub fn enrich_cached(
        self: &Arc<Self>,
        prediction: Prediction,
        source_mode: SourceMode,
    ) -> DiagnosisResult {
        let severity = severity_for(&prediction);

        let record = if prediction.is_healthy() {
            None
        } else {
            let cached = self.cached(prediction.class);
            if cached.is_none() {
                self.prefetch(prediction.class);
            }
            cached
        };

        DiagnosisResult::new(prediction, severity, record, source_mode)
    }

    pub fn cached(&self, class: ClassIdentity) -> Option<DiseaseRecord> {
        self.records.read().get(&class).cloned()
    }

    /// Start a background fetch for `class` unless one is already running.
    fn prefetch(self: &Arc<Self>, class: ClassIdentity) {
        if !self.fetching.lock().insert(class) {
            return;
        }

        let enricher = Arc::clone(self);
        tokio::spawn(async move {
            enricher.lookup(class).await;
            enricher.fetching.lock().remove(&class);
        });
    }

    async fn lookup(&self, class: ClassIdentity) -> Option<DiseaseRecord> {
        let outcome = match tokio::time::timeout(self.timeout, self.store.lookup(class)).await {
            Ok(result) => result,
            Err(_) => Err(EnrichmentError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(Some(record)) => {
                self.records.write().insert(class, record.clone());
                Some(record)
            }
            Ok(None) => {
                tracing::warn!(%class, "No disease record found");
                self.record_failure("not_found");
                None
            }
            Err(e) => {
                tracing::warn!(%class, error = %e, "Disease record lookup failed");
                self.record_failure(e.kind());
                None
            }
        }
    }

    fn record_failure(&self, reason: &'static str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.failures_counter.add(1, &[KeyValue::new("reason", reason)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LookupFuture, StaticKnowledgeStore};
    use schema::SeverityLevel;
    use std::sync::atomic::AtomicUsize;

    /// Store that never answers.
    struct Hanging;

    impl KnowledgeStore for Hanging {
        fn lookup(&self, _class: ClassIdentity) -> LookupFuture<'_> {
            Box::pin(std::future::pending())
        }
    }

    /// Store that fails and counts calls.
    struct Unreachable(AtomicUsize);

    impl KnowledgeStore for Unreachable {
        fn lookup(&self, _class: ClassIdentity) -> LookupFuture<'_> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(EnrichmentError::Network("connection refused".to_string())) })
        }
    }

    /// Store that serves one record and counts calls.
    struct Counting {
        calls: AtomicUsize,
        hang: bool,
    }

    impl Counting {
        fn new(hang: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                hang,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl KnowledgeStore for Counting {
        fn lookup(&self, _class: ClassIdentity) -> LookupFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                Box::pin(std::future::pending())
            } else {
                Box::pin(async { Ok(Some(record())) })
            }
        }
    }

    fn record() -> DiseaseRecord {
        DiseaseRecord {
            description: "Fungal".to_string(),
            treatment: "T".to_string(),
            symptoms: "Spots".to_string(),
        }
    }

    #[tokio::test]
    async fn merges_record_on_success() {
        let store = StaticKnowledgeStore::with_records([(ClassIdentity::AppleScab, record())]);
        let enricher = Enricher::new(Arc::new(store), DEFAULT_ENRICHMENT_TIMEOUT);

        let result = enricher
            .enrich(Prediction::new(ClassIdentity::AppleScab, 0.8), SourceMode::Captured)
            .await;

        assert_eq!(result.disease_record, Some(record()));
        assert_eq!(result.severity, Some(SeverityLevel::High));
        assert_eq!(enricher.failures(), 0);
    }

    #[tokio::test]
    async fn missing_record_is_not_an_error() {
        let store = Arc::new(StaticKnowledgeStore::new());
        let enricher = Enricher::new(store, DEFAULT_ENRICHMENT_TIMEOUT);

        let result = enricher
            .enrich(Prediction::new(ClassIdentity::AppleBlackRot, 0.5), SourceMode::Live)
            .await;

        assert_eq!(result.disease_record, None);
        assert_eq!(result.severity, Some(SeverityLevel::Medium));
        assert_eq!(enricher.failures(), 1);
    }

    #[tokio::test]
    async fn network_failure_keeps_model_fields() {
        let store = Arc::new(Unreachable(AtomicUsize::new(0)));
        let enricher = Enricher::new(store.clone(), DEFAULT_ENRICHMENT_TIMEOUT);

        let prediction = Prediction::new(ClassIdentity::CedarAppleRust, 0.9);
        let result = enricher.enrich(prediction.clone(), SourceMode::Captured).await;

        assert_eq!(result.prediction, prediction);
        assert_eq!(result.diseases, vec!["Cedar Apple Rust".to_string()]);
        assert_eq!(result.disease_record, None);
        assert_eq!(store.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn healthy_skips_lookup() {
        let store = Arc::new(Unreachable(AtomicUsize::new(0)));
        let enricher = Enricher::new(store.clone(), DEFAULT_ENRICHMENT_TIMEOUT);

        let result = enricher
            .enrich(Prediction::new(ClassIdentity::Healthy, 0.85), SourceMode::Live)
            .await;

        assert!(result.is_healthy());
        assert_eq!(result.severity, None);
        assert_eq!(store.0.load(Ordering::SeqCst), 0);
        assert_eq!(enricher.failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_is_cut_off_by_timeout() {
        let enricher = Enricher::new(Arc::new(Hanging), Duration::from_millis(50));

        let result = enricher
            .enrich(Prediction::new(ClassIdentity::AppleScab, 0.3), SourceMode::Live)
            .await;

        assert_eq!(result.disease_record, None);
        assert_eq!(result.severity, Some(SeverityLevel::Low));
        assert_eq!(enricher.failures(), 1);
    }

    // ========== Record Cache ==========

    #[tokio::test]
    async fn found_record_is_fetched_once() {
        let store = Counting::new(false);
        let enricher = Enricher::new(store.clone(), DEFAULT_ENRICHMENT_TIMEOUT);

        for _ in 0..3 {
            let result = enricher
                .enrich(Prediction::new(ClassIdentity::AppleScab, 0.8), SourceMode::Captured)
                .await;
            assert_eq!(result.disease_record, Some(record()));
        }

        assert_eq!(store.calls(), 1);
        assert_eq!(enricher.cached(ClassIdentity::AppleScab), Some(record()));
    }

    #[tokio::test]
    async fn failed_lookup_is_not_cached() {
        let store = Arc::new(Unreachable(AtomicUsize::new(0)));
        let enricher = Enricher::new(store.clone(), DEFAULT_ENRICHMENT_TIMEOUT);

        for _ in 0..2 {
            enricher
                .enrich(Prediction::new(ClassIdentity::AppleScab, 0.8), SourceMode::Captured)
                .await;
        }

        assert_eq!(store.0.load(Ordering::SeqCst), 2);
        assert_eq!(enricher.cached(ClassIdentity::AppleScab), None);
    }

    #[tokio::test]
    async fn cached_enrichment_fills_in_the_background() {
        let store = Counting::new(false);
        let enricher = Arc::new(Enricher::new(store.clone(), DEFAULT_ENRICHMENT_TIMEOUT));
        let prediction = Prediction::new(ClassIdentity::AppleBlackRot, 0.9);

        let first = enricher.enrich_cached(prediction.clone(), SourceMode::Live);
        assert_eq!(first.disease_record, None);
        assert_eq!(first.severity, Some(SeverityLevel::High));

        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = enricher.enrich_cached(prediction, SourceMode::Live);
        assert_eq!(second.disease_record, Some(record()));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn cached_enrichment_never_waits_on_a_hanging_store() {
        let store = Counting::new(true);
        let enricher = Arc::new(Enricher::new(store.clone(), Duration::from_secs(3)));

        let started = std::time::Instant::now();
        for _ in 0..20 {
            let result = enricher.enrich_cached(
                Prediction::new(ClassIdentity::CedarAppleRust, 0.6),
                SourceMode::Live,
            );
            assert_eq!(result.disease_record, None);
            tokio::task::yield_now().await;
        }

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(store.calls(), 1, "one background fetch per class");
    }
}
