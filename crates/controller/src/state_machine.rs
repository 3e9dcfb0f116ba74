use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Preparing,
    Analyzing,
    Done,
    Failed,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisState::Done | AnalysisState::Failed)
    }

    fn can_advance_to(self, next: AnalysisState) -> bool {
        use AnalysisState::*;
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Preparing, Analyzing)
                | (Analyzing, Done)
                | (Idle | Preparing | Analyzing, Failed)
        )
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Preparing => "preparing",
            AnalysisState::Analyzing => "analyzing",
            AnalysisState::Done => "done",
            AnalysisState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid analysis transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: AnalysisState,
    pub to: AnalysisState,
}

/// Lifecycle of a single analysis call: `Idle -> Preparing -> Analyzing ->
/// Done | Failed`.
pub struct AnalysisRun {
    current_state: AnalysisState,
    started_at: Instant,
}

impl AnalysisRun {
    pub fn new() -> Self {
        Self {
            current_state: AnalysisState::Idle,
            started_at: Instant::now(),
        }
    }

    /// Move to `next`. Returns the previous state.
    pub fn advance(&mut self, next: AnalysisState) -> Result<AnalysisState, InvalidTransition> {
        let old_state = self.current_state;

        if !old_state.can_advance_to(next) {
            return Err(InvalidTransition {
                from: old_state,
                to: next,
            });
        }

        self.current_state = next;
        tracing::debug!(
            from = %old_state,
            to = %next,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Analysis state transition"
        );
        Ok(old_state)
    }

    pub fn current_state(&self) -> AnalysisState {
        self.current_state
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for AnalysisRun {
    fn default() -> Self {
        Self::new()
    }
}
