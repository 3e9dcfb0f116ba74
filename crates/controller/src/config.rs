use capture::DeviceRetryPolicy;
use common::env_or;
use inference::InputKind;
use knowledge::DEFAULT_ENRICHMENT_TIMEOUT;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub use common::Environment;

pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub environment: Environment,
    pub model_path: PathBuf,
    pub model_input_name: String,
    pub model_input_kind: InputKind,
    /// Unset means the built-in offline catalog.
    pub knowledge_base_url: Option<String>,
    pub enrichment_timeout: Duration,
    pub analysis_timeout: Duration,
    pub device_id: Option<u32>,
    pub device_retry: DeviceRetryPolicy,
    pub otel_endpoint: Option<String>,
}

impl AnalysisConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let model_path = env::var("MODEL_PATH")
            .unwrap_or_else(|_| "models/leaf_classifier.onnx".to_string())
            .into();

        let model_input_name = env::var("MODEL_INPUT_NAME").unwrap_or_else(|_| "input".to_string());

        let model_input_kind = match env::var("MODEL_INPUT_KIND") {
            Ok(raw) => raw.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            Err(_) => InputKind::default(),
        };

        let knowledge_base_url = env::var("KNOWLEDGE_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let enrichment_timeout = Duration::from_millis(env_or(
            "ENRICHMENT_TIMEOUT_MS",
            DEFAULT_ENRICHMENT_TIMEOUT.as_millis() as u64,
        ));

        let analysis_timeout = Duration::from_millis(env_or(
            "ANALYSIS_TIMEOUT_MS",
            DEFAULT_ANALYSIS_TIMEOUT.as_millis() as u64,
        ));

        let device_id = env::var("DEVICE_ID").ok().and_then(|s| s.parse().ok());

        let device_retry = DeviceRetryPolicy {
            max_attempts: env_or("DEVICE_RETRY_ATTEMPTS", DeviceRetryPolicy::DEFAULT_ATTEMPTS),
            delay: Duration::from_millis(env_or(
                "DEVICE_RETRY_DELAY_MS",
                DeviceRetryPolicy::DEFAULT_DELAY.as_millis() as u64,
            )),
        };

        let otel_endpoint = env::var("OTEL_ENDPOINT").ok();

        Ok(Self {
            environment,
            model_path,
            model_input_name,
            model_input_kind,
            knowledge_base_url,
            enrichment_timeout,
            analysis_timeout,
            device_id,
            device_retry,
            otel_endpoint,
        })
    }
}
