use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tfam_model::{CompletionReport, JobName};
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /api/v1/tasks/{job}/{index}/complete - Report a task's exit code
    /// - GET /api/v1/session - Session phase and final status
    /// - GET /api/v1/cluster - Cluster spec registered so far
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/tasks/{job}/{index}/complete", post(complete_task::<H>))
            .route("/api/v1/session", get(session_status::<H>))
            .route("/api/v1/cluster", get(cluster_spec::<H>))
            .with_state(self.handler)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteTaskRequest {
    exit_code: i32,
}

/// POST /api/v1/tasks/{job}/{index}/complete
async fn complete_task<H>(
    State(handler): State<Arc<H>>,
    Path((job, index)): Path<(String, usize)>,
    Json(req): Json<CompleteTaskRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let job: JobName = job
        .parse()
        .map_err(|e: tfam_model::ModelError| ApiError::InvalidRequest(e.to_string()))?;
    debug!(%job, task_index = index, exit_code = req.exit_code, "completion report received");

    let ack = handler
        .report_completion(CompletionReport::new(job, index, req.exit_code))
        .await?;
    Ok(Json(ack))
}

/// GET /api/v1/session
async fn session_status<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.session_status().await?))
}

/// GET /api/v1/cluster
async fn cluster_spec<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.cluster_spec().await?))
}
