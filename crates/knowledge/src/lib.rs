//! Descriptive knowledge about disease classes and the merge of that
//! knowledge into model predictions.

pub mod enricher;
pub mod errors;
pub mod http;
pub mod static_store;

pub use enricher::{DEFAULT_ENRICHMENT_TIMEOUT, Enricher};
pub use errors::EnrichmentError;
pub use http::HttpKnowledgeStore;
pub use static_store::StaticKnowledgeStore;

use schema::{ClassIdentity, DiseaseRecord};
use std::future::Future;
use std::pin::Pin;

pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<DiseaseRecord>, EnrichmentError>> + Send + 'a>>;

/// Remote (or local) store of disease records, keyed by class identity.
///
/// `Ok(None)` means the store answered and has no record for the class.
pub trait KnowledgeStore: Send + Sync {
    fn lookup(&self, class: ClassIdentity) -> LookupFuture<'_>;
}
