use serde::{Deserialize, Serialize};

use crate::{Container, JobName, SessionId, TaskIndex};

/// A task bound to a granted container.
///
/// Created exactly once per container. The exit status moves from unset to a
/// single terminal value; a failed primary is never re-run in place but
/// replaced by promoting a standby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub job_name: JobName,
    /// Index reported by the task and used for its cluster-spec position.
    pub task_index: TaskIndex,
    pub session_id: SessionId,
    pub container: Container,
    /// `true` while the task waits in the standby queue.
    pub is_backup: bool,
    /// Primary slot the task occupies, `None` for a queued standby.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_index: Option<usize>,
    /// Training data partition the task works on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_partition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
}

impl Task {
    /// New primary task occupying slot `index`.
    pub fn primary(
        job_name: JobName,
        index: TaskIndex,
        session_id: SessionId,
        container: Container,
        data_partition: Option<String>,
    ) -> Self {
        Self {
            job_name,
            task_index: index,
            session_id,
            container,
            is_backup: false,
            array_index: Some(index),
            data_partition,
            exit_status: None,
        }
    }

    /// New standby task with a derived index.
    pub fn standby(job_name: JobName, index: TaskIndex, session_id: SessionId, container: Container) -> Self {
        Self {
            job_name,
            task_index: index,
            session_id,
            container,
            is_backup: true,
            array_index: None,
            data_partition: None,
            exit_status: None,
        }
    }

    /// Returns `true` if this task currently acts as the chief worker.
    #[inline]
    pub fn is_chief(&self) -> bool {
        self.job_name.is_chief(self.task_index)
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.exit_status.is_some()
    }

    #[inline]
    pub fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }

    #[inline]
    pub fn failed(&self) -> bool {
        matches!(self.exit_status, Some(code) if code != 0)
    }

    /// Record the terminal exit code.
    ///
    /// Returns `false` (and keeps the first value) if the task already finished.
    pub fn finish(&mut self, exit_code: i32) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        self.exit_status = Some(exit_code);
        true
    }
}
