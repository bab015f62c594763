//! Accumulation and publication of the cluster spec.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use tfam_model::{ClusterSpec, JobCatalog, JobName, TaskIndex};

use crate::{
    error::CoreError,
    store::{CoordinationStore, StoreLayout},
};

/// Result of registering one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Stored; the cluster spec is still incomplete.
    Recorded { ready: usize, expected: usize },
    /// The position already held an endpoint; nothing changed.
    Duplicate,
    /// This registration completed the cluster spec. Carries the serialized record,
    /// handed out exactly once per builder.
    Completed(Vec<u8>),
}

/// Collects `host:port` endpoints per `(job, task index)`.
///
/// Each role's table is sized to its primary plus standby slots, since any of
/// them may register. The cluster spec is complete when the number of populated
/// positions equals the number of containers requested for the session.
pub struct ClusterSpecBuilder {
    inner: Mutex<ClusterInner>,
}

struct ClusterInner {
    spec: ClusterSpec,
    ready_ps: usize,
    ready_worker: usize,
    expected: usize,
    completed: bool,
}

impl ClusterInner {
    fn ready(&self) -> usize {
        self.ready_ps + self.ready_worker
    }
}

impl ClusterSpecBuilder {
    pub fn new(catalog: &JobCatalog) -> Self {
        let spec = ClusterSpec::with_slots(
            catalog.total_slots(JobName::Ps),
            catalog.total_slots(JobName::Worker),
        );
        Self {
            inner: Mutex::new(ClusterInner {
                spec,
                ready_ps: 0,
                ready_worker: 0,
                expected: catalog.total_containers(),
                completed: false,
            }),
        }
    }

    /// Store `endpoint` at `(job, index)`.
    ///
    /// Repeated registrations of a populated position are ignored.
    pub fn register(&self, job: JobName, index: TaskIndex, endpoint: &str) -> Result<Registration, CoreError> {
        let mut inner = self.lock();
        let table = inner.spec.endpoints_mut(job);
        let len = table.len();
        let position = table
            .get_mut(index)
            .ok_or(CoreError::IndexOutOfRange { job, index, len })?;

        if let Some(existing) = position.as_deref() {
            if existing != endpoint {
                warn!(%job, task_index = index, existing, endpoint, "conflicting endpoint registration ignored");
            } else {
                debug!(%job, task_index = index, endpoint, "duplicate endpoint registration ignored");
            }
            return Ok(Registration::Duplicate);
        }
        *position = Some(endpoint.to_string());
        match job {
            JobName::Ps => inner.ready_ps += 1,
            JobName::Worker => inner.ready_worker += 1,
        }

        let ready = inner.ready();
        let expected = inner.expected;
        if ready < expected || inner.completed {
            debug!(%job, task_index = index, ready, expected, "endpoint registered");
            return Ok(Registration::Recorded { ready, expected });
        }

        inner.completed = true;
        let payload = serde_json::to_vec_pretty(&inner.spec)?;
        info!(ready, expected, "all endpoints registered; cluster spec complete");
        Ok(Registration::Completed(payload))
    }

    /// Returns `true` if every requested container registered an endpoint.
    pub fn is_complete(&self) -> bool {
        let inner = self.lock();
        inner.ready() == inner.expected
    }

    /// Populated positions across both roles.
    pub fn ready(&self) -> usize {
        self.lock().ready()
    }

    pub fn ready_for(&self, job: JobName) -> usize {
        let inner = self.lock();
        match job {
            JobName::Ps => inner.ready_ps,
            JobName::Worker => inner.ready_worker,
        }
    }

    pub fn expected(&self) -> usize {
        self.lock().expected
    }

    /// Current table, complete or not.
    pub fn snapshot(&self) -> ClusterSpec {
        self.lock().spec.clone()
    }

    /// Serialized current table; positions are task indices.
    pub fn serialize(&self) -> Result<Vec<u8>, CoreError> {
        let inner = self.lock();
        Ok(serde_json::to_vec_pretty(&inner.spec)?)
    }

    fn lock(&self) -> MutexGuard<'_, ClusterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write the serialized cluster spec to its well-known key.
pub async fn publish<S>(store: &S, layout: &StoreLayout, payload: &[u8]) -> Result<(), CoreError>
where
    S: CoordinationStore + ?Sized,
{
    store.put(layout.final_cluster_key(), payload).await?;
    info!(key = layout.final_cluster_key(), bytes = payload.len(), "cluster spec published");
    Ok(())
}
