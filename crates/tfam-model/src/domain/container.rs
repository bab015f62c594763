use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a container granted by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A container granted by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: ContainerId,
    /// Address of the node manager hosting the container.
    pub node_address: String,
    pub memory_mb: u64,
    pub vcores: u32,
}

impl Container {
    pub fn new(id: ContainerId, node_address: impl Into<String>, memory_mb: u64, vcores: u32) -> Self {
        Self {
            id,
            node_address: node_address.into(),
            memory_mb,
            vcores,
        }
    }
}
