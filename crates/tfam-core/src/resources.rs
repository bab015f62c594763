use async_trait::async_trait;

use tfam_model::{ContainerId, JobSpec};

use crate::error::CoreError;

/// Cluster resource manager the session requests containers from.
///
/// Grants arrive asynchronously and are fed to
/// [`SessionCoordinator::on_container_granted`](crate::SessionCoordinator::on_container_granted).
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Ask for `count` containers shaped like `spec`.
    async fn request_containers(&self, spec: &JobSpec, count: usize) -> Result<(), CoreError>;
}

/// Node-level container control.
#[async_trait]
pub trait NodeManager: Send + Sync {
    async fn stop_container(&self, id: &ContainerId, node_address: &str) -> Result<(), CoreError>;
}
