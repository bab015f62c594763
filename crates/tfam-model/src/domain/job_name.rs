use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Role of a task inside the training cluster.
///
/// The chief is not a role of its own: it is the worker with task index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobName {
    /// Parameter server.
    Ps,
    /// Training worker.
    Worker,
}

impl JobName {
    /// Every role, in the order the cluster spec lists them.
    pub const ALL: [JobName; 2] = [JobName::Ps, JobName::Worker];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Ps => "ps",
            JobName::Worker => "worker",
        }
    }

    /// Returns `true` if `(self, index)` names the chief worker.
    #[inline]
    pub fn is_chief(&self, index: usize) -> bool {
        matches!(self, JobName::Worker) && index == 0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "ps" => Ok(JobName::Ps),
            "worker" => Ok(JobName::Worker),
            _ => Err(ModelError::UnknownJobName(s.to_string())),
        }
    }
}
