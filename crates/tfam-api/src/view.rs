use serde::{Deserialize, Serialize};
use tfam_model::{FinalStatus, SessionPhase, SessionStatus};

/// Externally visible state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub phase: SessionPhase,
    pub final_status: FinalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub ready_endpoints: usize,
    pub expected_endpoints: usize,
    pub completed_workers: usize,
}

/// Answer to a completion report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionAck {
    /// `succeeded`, `failed`, `standby_dropped` or `duplicate`.
    pub outcome: String,
    /// Session status after re-evaluation.
    pub status: SessionStatus,
}
