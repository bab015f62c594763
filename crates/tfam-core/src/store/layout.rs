use tfam_model::ContainerId;

use crate::error::CoreError;

const CLUSTER_ROOT: &str = "/tensorflow/cluster/";
const FINAL_CLUSTER_KEY: &str = "/tensorflow/final_cluster";
const DATA_PARTITION_ROOT: &str = "/tensorflow/training_data/";

/// Key layout of a session inside the coordination store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Parent of the per-container endpoint keys written by task executors.
    pub cluster_root: String,
    /// Well-known key holding the published cluster spec.
    pub final_cluster_key: String,
    /// Parent of the per-container keys waking up promoted standbys.
    pub data_partition_root: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            cluster_root: CLUSTER_ROOT.to_string(),
            final_cluster_key: FINAL_CLUSTER_KEY.to_string(),
            data_partition_root: DATA_PARTITION_ROOT.to_string(),
        }
    }
}

impl StoreLayout {
    /// Key a task executor writes its `host:port` to.
    pub fn endpoint_key(&self, container: &ContainerId) -> String {
        format!("{}{}", self.cluster_root, container)
    }

    /// Key carrying the data partition inherited by a promoted standby.
    pub fn data_partition_key(&self, container: &ContainerId) -> String {
        format!("{}{}", self.data_partition_root, container)
    }

    pub fn final_cluster_key(&self) -> &str {
        &self.final_cluster_key
    }

    /// Container whose endpoint key is `path`, if `path` is one.
    pub fn container_for(&self, path: &str) -> Option<ContainerId> {
        let id = path.strip_prefix(self.cluster_root.as_str())?;
        if id.is_empty() || id.contains('/') {
            return None;
        }
        Some(ContainerId::from(id))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, root) in [
            ("cluster_root", &self.cluster_root),
            ("data_partition_root", &self.data_partition_root),
        ] {
            if !root.starts_with('/') || !root.ends_with('/') {
                return Err(CoreError::InvalidConfig(format!(
                    "{name} must start and end with '/', got '{root}'"
                )));
            }
        }
        if self.final_cluster_key.is_empty() || self.final_cluster_key.ends_with('/') {
            return Err(CoreError::InvalidConfig(format!(
                "final_cluster_key must name a key, got '{}'",
                self.final_cluster_key
            )));
        }
        if self.container_for(&self.final_cluster_key).is_some() {
            return Err(CoreError::InvalidConfig(
                "final_cluster_key must not live directly under cluster_root".into(),
            ));
        }
        Ok(())
    }
}
