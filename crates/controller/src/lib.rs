pub mod config;
pub mod discrete;
pub mod error;
pub mod live;
pub mod mailbox;
pub mod metrics;
pub mod pipeline;
pub mod state_machine;

pub use config::AnalysisConfig;
pub use discrete::{CancellationHandle, DiscreteAnalyzer, SharedSource};
pub use error::AnalysisError;
pub use live::{FrameOutcome, LiveAnalyzer};
pub use mailbox::{LatestResult, MailboxReader, Published};
pub use metrics::{FrameStats, PipelineMetrics};
pub use pipeline::Pipeline;
pub use state_machine::{AnalysisRun, AnalysisState, InvalidTransition};
