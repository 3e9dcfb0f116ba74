use crate::errors::EnrichmentError;
use crate::{KnowledgeStore, LookupFuture};
use reqwest::StatusCode;
use schema::{ClassIdentity, DiseaseRecord};
use std::time::Duration;

/// Knowledge store reached over HTTP: `GET {base_url}/diseases/{identity}`.
///
/// The body is a JSON object with `description`, `treatment` and `symptoms`.
pub struct HttpKnowledgeStore {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpKnowledgeStore {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn record_url(&self, class: ClassIdentity) -> String {
        format!("{}/diseases/{}", self.base_url, class.key())
    }

    async fn fetch(&self, class: ClassIdentity) -> Result<Option<DiseaseRecord>, EnrichmentError> {
        let url = self.record_url(class);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<DiseaseRecord>()
                .await
                .map(Some)
                .map_err(|e| EnrichmentError::Malformed(e.to_string())),
            status => Err(EnrichmentError::Status(status.as_u16())),
        }
    }
}

impl KnowledgeStore for HttpKnowledgeStore {
    fn lookup(&self, class: ClassIdentity) -> LookupFuture<'_> {
        Box::pin(self.fetch(class))
    }
}
