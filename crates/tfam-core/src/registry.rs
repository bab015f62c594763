//! Task slots of a session.
//!
//! Every job owns a fixed array of primary slots (position == task index) and a
//! FIFO queue of standby tasks. All slot assignment, lookup and replacement goes
//! through one lock so that two concurrent grants can never bind the same slot.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, info, warn};

use tfam_model::{Container, ContainerId, JobCatalog, JobName, JobSpec, SessionId, Task, TaskIndex};

use crate::{error::CoreError, metrics::CompletionOutcomeKind};

/// Result of feeding a completion report into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// A queued standby terminated; it was removed from its queue.
    StandbyDropped(Task),
    /// A primary slot occupant finished; carries the updated task.
    Primary(Task),
    /// The task had already reported; nothing changed.
    Duplicate,
}

impl CompletionOutcome {
    pub fn kind(&self) -> CompletionOutcomeKind {
        match self {
            CompletionOutcome::StandbyDropped(_) => CompletionOutcomeKind::StandbyDropped,
            CompletionOutcome::Duplicate => CompletionOutcomeKind::Duplicate,
            CompletionOutcome::Primary(task) if task.failed() => CompletionOutcomeKind::Failed,
            CompletionOutcome::Primary(_) => CompletionOutcomeKind::Succeeded,
        }
    }
}

/// Consistent view of one job's slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub job: JobName,
    pub primary_slots: usize,
    pub filled_primaries: usize,
    pub pending_primaries: usize,
    pub pending_backups: usize,
    /// Standbys still queued.
    pub standby_queue: usize,
    /// Slot positions never filled.
    pub empty_slots: Vec<usize>,
    /// Slot positions whose occupant exited with a non-zero code.
    pub failed_slots: Vec<usize>,
    /// Slot positions whose occupant exited with code 0.
    pub succeeded_slots: Vec<usize>,
}

/// Consistent view of every job, taken under a single lock.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrySnapshot {
    pub jobs: Vec<JobSnapshot>,
}

impl RegistrySnapshot {
    pub fn job(&self, job: JobName) -> Option<&JobSnapshot> {
        self.jobs.iter().find(|j| j.job == job)
    }

    /// Returns `true` once every primary slot holds a task that exited with 0.
    pub fn all_primaries_succeeded(&self) -> bool {
        self.jobs
            .iter()
            .all(|j| j.succeeded_slots.len() == j.primary_slots)
    }

    /// Returns `true` once every primary slot holds a task that reported an exit code.
    pub fn all_primaries_finished(&self) -> bool {
        self.jobs
            .iter()
            .all(|j| j.succeeded_slots.len() + j.failed_slots.len() == j.primary_slots)
    }
}

pub struct TaskRegistry {
    session_id: SessionId,
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    /// Catalog order; the order grants are matched in.
    jobs: Vec<JobSlots>,
    /// Every container ever bound. Tasks that left the registry (dropped
    /// standbys, replaced primaries) stay here with `live == false`.
    containers: HashMap<ContainerId, Bound>,
    /// Data partition per primary worker slot.
    partitions: Vec<String>,
}

struct JobSlots {
    spec: JobSpec,
    primaries: Vec<Option<Task>>,
    backups: VecDeque<Task>,
    pending_primary: usize,
    pending_backup: usize,
}

struct Bound {
    container: Container,
    job: JobName,
    task_index: TaskIndex,
    live: bool,
}

impl TaskRegistry {
    /// Empty registry sized from `catalog`.
    ///
    /// `partitions[i]` is handed to the primary worker in slot `i`.
    pub fn new(catalog: &JobCatalog, session_id: SessionId, partitions: Vec<String>) -> Self {
        let jobs = catalog
            .iter()
            .map(|spec| JobSlots {
                spec: spec.clone(),
                primaries: vec![None; spec.primary_slots],
                backups: VecDeque::new(),
                pending_primary: spec.primary_slots,
                pending_backup: spec.backup_slots,
            })
            .collect();

        Self {
            session_id,
            inner: Mutex::new(RegistryInner {
                jobs,
                containers: HashMap::new(),
                partitions,
            }),
        }
    }

    /// First job (catalog order) the container fits and that still has pending slots.
    pub fn match_job(&self, container: &Container) -> Option<JobName> {
        self.lock().match_job(container)
    }

    /// Bind `container` to the next free slot of `job`.
    pub fn bind_container(&self, container: Container, job: JobName) -> Result<Task, CoreError> {
        let mut inner = self.lock();
        inner.bind(&self.session_id, container, job)
    }

    /// Match and bind in one critical section.
    pub fn assign(&self, container: Container) -> Result<Task, CoreError> {
        let mut inner = self.lock();
        let Some(job) = inner.match_job(&container) else {
            return Err(CoreError::NoMatchingJob {
                memory_mb: container.memory_mb,
                vcores: container.vcores,
                container: container.id,
            });
        };
        inner.bind(&self.session_id, container, job)
    }

    /// Task currently running in `id`; `None` once the task left the registry.
    pub fn lookup_by_container(&self, id: &ContainerId) -> Option<Task> {
        let inner = self.lock();
        let bound = inner.containers.get(id).filter(|b| b.live)?;
        let slots = inner.slots(bound.job)?;
        slots
            .primaries
            .iter()
            .flatten()
            .chain(slots.backups.iter())
            .find(|t| &t.container.id == id)
            .cloned()
    }

    /// Primary slot occupant reporting as `(job, index)`.
    pub fn lookup_primary(&self, job: JobName, index: TaskIndex) -> Option<Task> {
        let inner = self.lock();
        inner
            .slots(job)?
            .primaries
            .iter()
            .flatten()
            .find(|t| t.task_index == index)
            .cloned()
    }

    /// Queued standby reporting as `(job, index)`.
    pub fn lookup_backup(&self, job: JobName, index: TaskIndex) -> Option<Task> {
        let inner = self.lock();
        inner
            .slots(job)?
            .backups
            .iter()
            .find(|t| t.task_index == index)
            .cloned()
    }

    /// Occupant of primary slot `slot`.
    pub fn primary_at(&self, job: JobName, slot: usize) -> Option<Task> {
        let inner = self.lock();
        inner.slots(job)?.primaries.get(slot).cloned().flatten()
    }

    /// Head of the standby queue of `job`.
    pub fn peek_standby(&self, job: JobName) -> Option<Task> {
        let inner = self.lock();
        inner.slots(job)?.backups.front().cloned()
    }

    pub fn standby_count(&self, job: JobName) -> usize {
        self.lock().slots(job).map_or(0, |s| s.backups.len())
    }

    /// Record the exit code reported for `(job, index)`.
    ///
    /// A queued standby that terminates is dropped from its queue. A primary
    /// keeps the first exit code it reported. Reports from tasks that already
    /// left the registry are duplicates.
    pub fn record_completion(
        &self,
        job: JobName,
        index: TaskIndex,
        exit_code: i32,
    ) -> Result<CompletionOutcome, CoreError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let retired = inner
            .containers
            .values()
            .any(|b| b.job == job && b.task_index == index && !b.live);
        if retired {
            debug!(%job, task_index = index, exit_code, "report from a retired task ignored");
            return Ok(CompletionOutcome::Duplicate);
        }
        let slots = inner
            .jobs
            .iter_mut()
            .find(|s| s.spec.job_name == job)
            .ok_or(CoreError::TaskNotFound { job, index })?;

        if let Some(pos) = slots.backups.iter().position(|t| t.task_index == index) {
            let mut standby = slots.backups.remove(pos).ok_or(CoreError::TaskNotFound { job, index })?;
            standby.finish(exit_code);
            if let Some(bound) = inner.containers.get_mut(&standby.container.id) {
                bound.live = false;
            }
            warn!(%job, task_index = index, exit_code, "standby terminated before promotion; dropped");
            return Ok(CompletionOutcome::StandbyDropped(standby));
        }

        let task = slots
            .primaries
            .iter_mut()
            .flatten()
            .find(|t| t.task_index == index)
            .ok_or(CoreError::TaskNotFound { job, index })?;

        if !task.finish(exit_code) {
            debug!(%job, task_index = index, exit_code, "duplicate completion report ignored");
            return Ok(CompletionOutcome::Duplicate);
        }
        Ok(CompletionOutcome::Primary(task.clone()))
    }

    /// Replace the occupant of primary slot `slot` with the queued standby running in `standby`.
    ///
    /// The standby inherits the replaced task's data partition. The replaced task is discarded.
    pub fn promote(&self, job: JobName, slot: usize, standby: &ContainerId) -> Result<Task, CoreError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let slots = inner
            .jobs
            .iter_mut()
            .find(|s| s.spec.job_name == job)
            .ok_or(CoreError::SlotEmpty { job, index: slot })?;

        let len = slots.primaries.len();
        let entry = slots
            .primaries
            .get_mut(slot)
            .ok_or(CoreError::IndexOutOfRange { job, index: slot, len })?;
        let partition = match entry.as_ref() {
            Some(previous) => previous.data_partition.clone(),
            None => return Err(CoreError::SlotEmpty { job, index: slot }),
        };

        let pos = slots
            .backups
            .iter()
            .position(|t| &t.container.id == standby)
            .ok_or(CoreError::NoStandbyAvailable(job))?;
        let mut promoted = slots.backups.remove(pos).ok_or(CoreError::NoStandbyAvailable(job))?;
        promoted.is_backup = false;
        promoted.array_index = Some(slot);
        promoted.data_partition = partition;

        if let Some(previous) = entry.replace(promoted.clone()) {
            if let Some(bound) = inner.containers.get_mut(&previous.container.id) {
                bound.live = false;
            }
        }

        info!(
            %job,
            slot,
            task_index = promoted.task_index,
            container = %promoted.container.id,
            "standby promoted into primary slot"
        );
        Ok(promoted)
    }

    /// Consistent view of every job's slots.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.lock();
        let jobs = inner
            .jobs
            .iter()
            .map(|s| {
                let mut snap = JobSnapshot {
                    job: s.spec.job_name,
                    primary_slots: s.primaries.len(),
                    filled_primaries: 0,
                    pending_primaries: s.pending_primary,
                    pending_backups: s.pending_backup,
                    standby_queue: s.backups.len(),
                    empty_slots: Vec::new(),
                    failed_slots: Vec::new(),
                    succeeded_slots: Vec::new(),
                };
                for (i, slot) in s.primaries.iter().enumerate() {
                    match slot {
                        None => snap.empty_slots.push(i),
                        Some(task) => {
                            snap.filled_primaries += 1;
                            if task.failed() {
                                snap.failed_slots.push(i);
                            } else if task.succeeded() {
                                snap.succeeded_slots.push(i);
                            }
                        }
                    }
                }
                snap
            })
            .collect();
        RegistrySnapshot { jobs }
    }

    /// Every container ever bound in this session, live or retired.
    pub fn containers(&self) -> Vec<Container> {
        let inner = self.lock();
        let mut out: Vec<_> = inner.containers.values().map(|b| b.container.clone()).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn bound_count(&self) -> usize {
        self.lock().containers.len()
    }

    /// Primary workers that finished with exit code 0.
    pub fn completed_workers(&self) -> usize {
        let inner = self.lock();
        inner.slots(JobName::Worker).map_or(0, |s| {
            s.primaries.iter().flatten().filter(|t| t.succeeded()).count()
        })
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RegistryInner {
    fn slots(&self, job: JobName) -> Option<&JobSlots> {
        self.jobs.iter().find(|s| s.spec.job_name == job)
    }

    fn match_job(&self, container: &Container) -> Option<JobName> {
        self.jobs
            .iter()
            .find(|s| s.spec.fits(container) && (s.pending_primary > 0 || s.pending_backup > 0))
            .map(|s| s.spec.job_name)
    }

    fn bind(&mut self, session_id: &SessionId, container: Container, job: JobName) -> Result<Task, CoreError> {
        if self.containers.contains_key(&container.id) {
            return Err(CoreError::ContainerAlreadyBound(container.id));
        }
        let mismatch = |c: &Container| CoreError::NoMatchingJob {
            container: c.id.clone(),
            memory_mb: c.memory_mb,
            vcores: c.vcores,
        };

        let partition_for = |slot: usize, partitions: &[String]| match job {
            JobName::Worker => partitions.get(slot).cloned(),
            JobName::Ps => None,
        };

        let Some(slots) = self.jobs.iter_mut().find(|s| s.spec.job_name == job) else {
            return Err(mismatch(&container));
        };

        let task = if slots.pending_primary > 0 {
            let Some(slot) = slots.primaries.iter().position(Option::is_none) else {
                return Err(mismatch(&container));
            };
            let task = Task::primary(
                job,
                slot,
                session_id.clone(),
                container.clone(),
                partition_for(slot, &self.partitions),
            );
            slots.primaries[slot] = Some(task.clone());
            slots.pending_primary -= 1;
            task
        } else if slots.pending_backup > 0 {
            // Standby indices follow the primaries in grant order and are never reused.
            let index = slots.spec.primary_slots + (slots.spec.backup_slots - slots.pending_backup);
            let task = Task::standby(job, index, session_id.clone(), container.clone());
            slots.backups.push_back(task.clone());
            slots.pending_backup -= 1;
            task
        } else {
            return Err(mismatch(&container));
        };

        info!(
            %job,
            task_index = task.task_index,
            backup = task.is_backup,
            container = %container.id,
            node = %container.node_address,
            "container bound to task"
        );
        self.containers.insert(
            container.id.clone(),
            Bound {
                container,
                job,
                task_index: task.task_index,
                live: true,
            },
        );
        Ok(task)
    }
}
