use std::time::Duration;

/// Why a record could not be fetched. Never fatal to an analysis.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichmentError {
    #[error("knowledge store unreachable: {0}")]
    Network(String),

    #[error("knowledge store returned status {0}")]
    Status(u16),

    #[error("malformed disease record: {0}")]
    Malformed(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl EnrichmentError {
    /// Short label used as a metric attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichmentError::Network(_) => "network",
            EnrichmentError::Status(_) => "status",
            EnrichmentError::Malformed(_) => "malformed",
            EnrichmentError::Timeout(_) => "timeout",
        }
    }
}
