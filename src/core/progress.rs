// ─── Run Context ───
// Progress reporting and cooperative cancellation threaded through every phase.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Receives phase progress. All methods default to no-ops so sinks only
/// implement what they render.
pub trait ProgressSink: Send + Sync {
    /// Starts a new phase with `total` units of work.
    fn set_total(&self, _phase: &str, _total: u64) {}
    fn advance(&self, _delta: u64) {}
    fn done(&self) {}
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Per-run collaborators passed explicitly to the orchestrator and installer.
#[derive(Clone)]
pub struct RunContext {
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
