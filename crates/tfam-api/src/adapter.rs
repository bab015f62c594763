use std::sync::Arc;

use async_trait::async_trait;
use tfam_core::SessionCoordinator;
use tfam_model::{ClusterSpec, CompletionReport};
use tracing::info;

use crate::{
    error::ApiError,
    handler::ApiHandler,
    view::{CompletionAck, SessionView},
};

/// Adapter that bridges [`SessionCoordinator`] to [`ApiHandler`].
pub struct SessionApiAdapter {
    coordinator: Arc<SessionCoordinator>,
}

impl SessionApiAdapter {
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ApiHandler for SessionApiAdapter {
    async fn report_completion(&self, report: CompletionReport) -> Result<CompletionAck, ApiError> {
        let outcome = self.coordinator.on_task_completed(report)?;
        let status = self.coordinator.evaluate();
        info!(
            outcome = outcome.kind().as_str(),
            final_status = ?status.final_status,
            "completion report processed"
        );
        Ok(CompletionAck {
            outcome: outcome.kind().as_str().to_string(),
            status,
        })
    }

    async fn session_status(&self) -> Result<SessionView, ApiError> {
        let c = &self.coordinator;
        let status = c.final_status();
        Ok(SessionView {
            session_id: c.context().session_id().to_string(),
            phase: c.phase(),
            final_status: status.final_status,
            message: status.message,
            ready_endpoints: c.cluster().ready(),
            expected_endpoints: c.cluster().expected(),
            completed_workers: c.completed_workers(),
        })
    }

    async fn cluster_spec(&self) -> Result<ClusterSpec, ApiError> {
        Ok(self.coordinator.cluster_spec())
    }
}
