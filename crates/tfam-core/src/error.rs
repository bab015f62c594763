use thiserror::Error;

use tfam_model::{ContainerId, JobName, ModelError};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no job matches container {container} (memory={memory_mb}MB, vcores={vcores})")]
    NoMatchingJob {
        container: ContainerId,
        memory_mb: u64,
        vcores: u32,
    },

    #[error("container {0} is already bound to a task")]
    ContainerAlreadyBound(ContainerId),

    #[error("container {0} is not bound to any task")]
    UnknownContainer(ContainerId),

    #[error("task {job}:{index} not found")]
    TaskNotFound { job: JobName, index: usize },

    #[error("task index {index} out of range for {job} (slots: {len})")]
    IndexOutOfRange { job: JobName, index: usize, len: usize },

    #[error("no standby task available for {0}")]
    NoStandbyAvailable(JobName),

    #[error("primary slot {job}:{index} holds no task")]
    SlotEmpty { job: JobName, index: usize },

    #[error("resource manager: {0}")]
    ResourceManager(String),

    #[error("node manager: {0}")]
    NodeManager(String),

    #[error("coordination store: {0}")]
    Store(#[from] StoreError),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
