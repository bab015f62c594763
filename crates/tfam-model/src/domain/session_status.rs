use serde::{Deserialize, Serialize};

/// Final outcome reported to the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    #[default]
    Undefined,
    Succeeded,
    Failed,
}

/// Last evaluated status of a session.
///
/// Once `Failed` it is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub final_status: FinalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SessionStatus {
    pub fn succeeded() -> Self {
        Self {
            final_status: FinalStatus::Succeeded,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            final_status: FinalStatus::Failed,
            message: Some(message.into()),
        }
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.final_status == FinalStatus::Failed
    }

    #[inline]
    pub fn is_succeeded(&self) -> bool {
        self.final_status == FinalStatus::Succeeded
    }
}

/// Lifecycle of a session. `Succeeded` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    Initializing,
    /// Containers requested, not all granted yet.
    Scheduling,
    /// Every requested container is bound to a task.
    Running,
    Succeeded,
    Failed,
}

impl SessionPhase {
    /// Returns `true` if the phase can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Succeeded | SessionPhase::Failed)
    }
}
