use serde::{Deserialize, Serialize};

use crate::{Endpoint, JobName};

/// Published cluster topology.
///
/// One array per role; position == task index. Positions stay `null` until the
/// task at that index registers its endpoint. Training processes parse this
/// record to find their peers, so field names and ordering are a wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub ps: Vec<Option<Endpoint>>,
    pub worker: Vec<Option<Endpoint>>,
}

impl ClusterSpec {
    /// Empty table with `ps_slots` and `worker_slots` positions.
    pub fn with_slots(ps_slots: usize, worker_slots: usize) -> Self {
        Self {
            ps: vec![None; ps_slots],
            worker: vec![None; worker_slots],
        }
    }

    pub fn endpoints(&self, job: JobName) -> &[Option<Endpoint>] {
        match job {
            JobName::Ps => &self.ps,
            JobName::Worker => &self.worker,
        }
    }

    pub fn endpoints_mut(&mut self, job: JobName) -> &mut Vec<Option<Endpoint>> {
        match job {
            JobName::Ps => &mut self.ps,
            JobName::Worker => &mut self.worker,
        }
    }

    pub fn get(&self, job: JobName, index: usize) -> Option<&str> {
        self.endpoints(job).get(index).and_then(|e| e.as_deref())
    }

    /// Number of populated positions across both roles.
    pub fn populated(&self) -> usize {
        self.ps.iter().chain(self.worker.iter()).filter(|e| e.is_some()).count()
    }
}
