use anyhow::{Context, Result};
use capture::StillImageSource;
use clap::{Parser, Subcommand};
use common::{TelemetryGuard, setup_logging};
use controller::{AnalysisConfig, CancellationHandle, DiscreteAnalyzer, Pipeline};
use inference::{ModelManager, OrtLoader};
use knowledge::{Enricher, HttpKnowledgeStore, KnowledgeStore, StaticKnowledgeStore};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "diagnose", about = "Plant leaf disease diagnosis")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Analyze a single photo and print the diagnosis as JSON
    Photo { path: PathBuf },
    /// Analyze the camera preview until interrupted
    Live,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AnalysisConfig::from_env()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    // The guard installs its own subscriber, so plain logging is only set up without it.
    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(runtime.block_on(async {
            TelemetryGuard::init("diagnose", endpoint, config.environment)
        })?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    tracing::info!("Diagnose starting with config: {:?}", config);

    let pipeline = Arc::new(build_pipeline(&config)?);

    match cli.mode {
        Mode::Photo { path } => runtime.block_on(run_photo(&config, pipeline, path)),
        Mode::Live => run_live(&config, &runtime, pipeline),
    }
}

fn build_pipeline(config: &AnalysisConfig) -> Result<Pipeline> {
    let loader = OrtLoader {
        path: config.model_path.clone(),
        input_name: config.model_input_name.clone(),
        input_kind: config.model_input_kind,
    };

    let store: Arc<dyn KnowledgeStore> = match config.knowledge_base_url.as_deref() {
        Some(url) => {
            tracing::info!(url, "Using remote knowledge base");
            Arc::new(
                HttpKnowledgeStore::new(url, config.enrichment_timeout)
                    .context("Failed to build knowledge base client")?,
            )
        }
        None => {
            tracing::info!("Using built-in disease catalog");
            Arc::new(StaticKnowledgeStore::builtin())
        }
    };

    Ok(Pipeline::new(
        Arc::new(ModelManager::new(loader)),
        Enricher::new(store, config.enrichment_timeout),
    ))
}

async fn run_photo(config: &AnalysisConfig, pipeline: Arc<Pipeline>, path: PathBuf) -> Result<()> {
    let source = StillImageSource::open(&path)
        .with_context(|| format!("Failed to open photo {}", path.display()))?;
    let source = Arc::new(Mutex::new(source));

    let analyzer = DiscreteAnalyzer::new(pipeline, config.analysis_timeout);
    let result = analyzer
        .analyze(&source, &CancellationHandle::new())
        .await
        .context("Analysis failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(feature = "v4l-camera")]
fn run_live(
    config: &AnalysisConfig,
    runtime: &tokio::runtime::Runtime,
    pipeline: Arc<Pipeline>,
) -> Result<()> {
    use capture::{DeviceSelector, V4lCamera, V4lEnumerator};
    use controller::{LatestResult, LiveAnalyzer};
    use signal_hook::{
        consts::{SIGINT, SIGTERM},
        flag,
    };
    use std::sync::atomic::AtomicBool;

    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    runtime
        .block_on(pipeline.load_model())
        .context("Model failed to load")?;

    let device = DeviceSelector::new(V4lEnumerator, config.device_retry)
        .with_preferred_index(config.device_id)
        .select(&shutdown)
        .context("No camera available")?;
    tracing::info!(index = device.index, name = %device.name, facing = ?device.facing, "Camera selected");

    let camera = V4lCamera::open(&device)?;
    let mut stream = camera.stream()?;

    let mailbox = LatestResult::new();
    let mut reader = mailbox.subscribe();
    runtime.spawn(async move {
        while let Some(published) = reader.changed().await {
            let result = &published.result;
            tracing::info!(
                sequence = published.sequence,
                class = %result.prediction.class,
                confidence = result.prediction.confidence,
                severity = ?result.severity,
                "Latest diagnosis"
            );
        }
    });

    let analyzer = LiveAnalyzer::new(pipeline, mailbox, runtime.handle().clone());
    analyzer.run(&mut stream, &shutdown)?;
    runtime.block_on(analyzer.settle());

    tracing::info!("Diagnose stopped");
    Ok(())
}

#[cfg(not(feature = "v4l-camera"))]
fn run_live(
    _config: &AnalysisConfig,
    _runtime: &tokio::runtime::Runtime,
    _pipeline: Arc<Pipeline>,
) -> Result<()> {
    anyhow::bail!("live mode requires the `v4l-camera` feature")
}
