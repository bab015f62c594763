use async_trait::async_trait;
use tfam_model::{ClusterSpec, CompletionReport};

use crate::{
    error::ApiError,
    view::{CompletionAck, SessionView},
};

/// Session API handler.
///
/// Abstracts the backend so the transport can be mounted on the provided
/// [`SessionApiAdapter`](crate::SessionApiAdapter) or on a custom handler
/// adding authentication or auditing.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Record a task's exit code and re-evaluate the session status.
    async fn report_completion(&self, report: CompletionReport) -> Result<CompletionAck, ApiError>;

    /// Current phase and final status of the session.
    async fn session_status(&self) -> Result<SessionView, ApiError>;

    /// Cluster spec as registered so far.
    async fn cluster_spec(&self) -> Result<ClusterSpec, ApiError>;
}
