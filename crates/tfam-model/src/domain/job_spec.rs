use serde::{Deserialize, Serialize};

use crate::{Container, JobName, ModelError};

/// Resource request for every container of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub job_name: JobName,
    /// Memory per container in megabytes.
    pub memory_mb: u64,
    /// Virtual cores per container.
    pub vcores: u32,
    /// Scheduling priority handed to the resource manager.
    #[serde(default)]
    pub priority: i32,
    /// Number of primary task slots.
    pub primary_slots: usize,
    /// Number of standby tasks kept idle to replace failed primaries.
    #[serde(default)]
    pub backup_slots: usize,
}

impl JobSpec {
    pub fn new(job_name: JobName, memory_mb: u64, vcores: u32) -> Self {
        Self {
            job_name,
            memory_mb,
            vcores,
            priority: 0,
            primary_slots: 0,
            backup_slots: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_slots(mut self, primary: usize, backup: usize) -> Self {
        self.primary_slots = primary;
        self.backup_slots = backup;
        self
    }

    /// Primaries plus standbys; the number of containers requested for this job.
    #[inline]
    pub fn total_slots(&self) -> usize {
        self.primary_slots + self.backup_slots
    }

    /// Returns `true` if the granted container has exactly the requested shape.
    #[inline]
    pub fn fits(&self, container: &Container) -> bool {
        self.memory_mb == container.memory_mb && self.vcores == container.vcores
    }

    fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: &str| ModelError::InvalidJob {
            job: self.job_name.to_string(),
            reason: reason.to_string(),
        };
        if self.memory_mb == 0 {
            return Err(invalid("memory must be positive"));
        }
        if self.vcores == 0 {
            return Err(invalid("vcores must be positive"));
        }
        if self.primary_slots == 0 {
            return Err(invalid("at least one primary slot is required"));
        }
        Ok(())
    }
}

/// Per-session catalog of container requests.
///
/// Built once and read-only afterwards. Declaration order is kept and is the
/// order jobs are tried in when a granted container is matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<JobSpec>", into = "Vec<JobSpec>")]
pub struct JobCatalog {
    jobs: Vec<JobSpec>,
}

impl JobCatalog {
    pub fn new(jobs: Vec<JobSpec>) -> Result<Self, ModelError> {
        for (i, job) in jobs.iter().enumerate() {
            job.validate()?;
            if jobs[..i].iter().any(|j| j.job_name == job.job_name) {
                return Err(ModelError::DuplicateJob(job.job_name.to_string()));
            }
        }
        Ok(Self { jobs })
    }

    pub fn get(&self, job: JobName) -> Option<&JobSpec> {
        self.jobs.iter().find(|j| j.job_name == job)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobSpec> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Primary slots of `job`, zero if the job is not declared.
    pub fn primary_slots(&self, job: JobName) -> usize {
        self.get(job).map_or(0, |j| j.primary_slots)
    }

    /// Primary plus standby slots of `job`, zero if the job is not declared.
    pub fn total_slots(&self, job: JobName) -> usize {
        self.get(job).map_or(0, JobSpec::total_slots)
    }

    /// Every container the session requests, across all jobs.
    pub fn total_containers(&self) -> usize {
        self.jobs.iter().map(JobSpec::total_slots).sum()
    }
}

impl TryFrom<Vec<JobSpec>> for JobCatalog {
    type Error = ModelError;

    fn try_from(jobs: Vec<JobSpec>) -> Result<Self, Self::Error> {
        Self::new(jobs)
    }
}

impl From<JobCatalog> for Vec<JobSpec> {
    fn from(catalog: JobCatalog) -> Self {
        catalog.jobs
    }
}
