use serde::{Deserialize, Serialize};

use crate::{ContainerId, Endpoint, JobName, TaskIndex};

/// Exit report sent by a task executor when its process terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub job_name: JobName,
    pub task_index: TaskIndex,
    pub exit_code: i32,
}

impl CompletionReport {
    pub fn new(job_name: JobName, task_index: TaskIndex, exit_code: i32) -> Self {
        Self {
            job_name,
            task_index,
            exit_code,
        }
    }
}

/// A task published its endpoint for the container it runs in.
///
/// Decoded once from a coordination-store notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRegistered {
    pub container_id: ContainerId,
    pub endpoint: Endpoint,
}

impl EndpointRegistered {
    pub fn new(container_id: ContainerId, endpoint: impl Into<Endpoint>) -> Self {
        Self {
            container_id,
            endpoint: endpoint.into(),
        }
    }
}
