use tfam_model::JobName;

/// How a completion report was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcomeKind {
    Succeeded,
    Failed,
    /// A standby failed while still queued.
    StandbyDropped,
    Duplicate,
}

impl CompletionOutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionOutcomeKind::Succeeded => "succeeded",
            CompletionOutcomeKind::Failed => "failed",
            CompletionOutcomeKind::StandbyDropped => "standby_dropped",
            CompletionOutcomeKind::Duplicate => "duplicate",
        }
    }
}

/// Sink for session metrics.
///
/// Implementations must be cheap; they are called from event handlers.
pub trait MetricsBackend: Send + Sync {
    fn record_container_granted(&self, job: JobName);
    fn record_task_completed(&self, job: JobName, outcome: CompletionOutcomeKind);
    fn record_standby_promoted(&self, job: JobName);
    fn set_ready_endpoints(&self, ready: usize);
    fn record_cluster_published(&self);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_container_granted(&self, _job: JobName) {}
    fn record_task_completed(&self, _job: JobName, _outcome: CompletionOutcomeKind) {}
    fn record_standby_promoted(&self, _job: JobName) {}
    fn set_ready_endpoints(&self, _ready: usize) {}
    fn record_cluster_published(&self) {}
}
