//! Failure accounting and the derivation of the session's final status.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info};

use tfam_model::{JobName, SessionStatus, TaskIndex};

use crate::{config::SessionConfig, registry::RegistrySnapshot};

/// Fault-tolerance policy of a session.
///
/// Failure queues hold `(slot, task index)` entries for primaries that failed.
/// Promoting a standby withdraws only the entry of the task it replaced, so a
/// failure of the new occupant is never lost. Standby failures never reach the
/// policy. A role fails once its failure count exceeds
/// [`FaultPolicy::max_failures_allowed`].
pub struct FaultPolicy {
    ps_threshold: f64,
    worker_threshold: f64,
    inner: Mutex<PolicyInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Failure {
    slot: usize,
    task_index: TaskIndex,
}

struct PolicyInner {
    failed_ps: Vec<Failure>,
    failed_workers: Vec<Failure>,
    chief_success: bool,
    status: SessionStatus,
}

impl PolicyInner {
    fn failed_mut(&mut self, job: JobName) -> &mut Vec<Failure> {
        match job {
            JobName::Ps => &mut self.failed_ps,
            JobName::Worker => &mut self.failed_workers,
        }
    }
}

impl FaultPolicy {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            ps_threshold: config.threshold(JobName::Ps),
            worker_threshold: config.threshold(JobName::Worker),
            inner: Mutex::new(PolicyInner {
                failed_ps: Vec::new(),
                failed_workers: Vec::new(),
                chief_success: true,
                status: SessionStatus::default(),
            }),
        }
    }

    /// Record that task `task_index`, occupying primary slot `slot`, exited with a non-zero code.
    pub fn record_failure(&self, job: JobName, slot: usize, task_index: TaskIndex, chief: bool) {
        let mut inner = self.lock();
        if chief {
            error!("chief worker failed; session cannot succeed");
            inner.chief_success = false;
        }
        let entry = Failure { slot, task_index };
        let failed = inner.failed_mut(job);
        if !failed.contains(&entry) {
            failed.push(entry);
        }
    }

    /// Forget the failure of task `task_index` in `slot` after a standby replaced it.
    pub fn withdraw(&self, job: JobName, slot: usize, task_index: TaskIndex) -> bool {
        let mut inner = self.lock();
        let failed = inner.failed_mut(job);
        let before = failed.len();
        failed.retain(|f| *f != Failure { slot, task_index });
        failed.len() != before
    }

    /// Slot positions currently counted as failed for `job`, one per failure.
    pub fn failed(&self, job: JobName) -> Vec<usize> {
        let mut inner = self.lock();
        inner.failed_mut(job).iter().map(|f| f.slot).collect()
    }

    pub fn chief_succeeded(&self) -> bool {
        self.lock().chief_success
    }

    /// `floor(threshold * primaries) + queued standbys`.
    ///
    /// Each queued standby can still absorb one replacement.
    pub fn max_failures_allowed(&self, job: JobName, primaries: usize, standbys: usize) -> usize {
        let threshold = match job {
            JobName::Ps => self.ps_threshold,
            JobName::Worker => self.worker_threshold,
        };
        (threshold * primaries as f64).floor() as usize + standbys
    }

    /// Re-derive the session status. A `Failed` status is never overwritten.
    ///
    /// A role fails only when its failure count is strictly greater than
    /// [`FaultPolicy::max_failures_allowed`]; reaching the limit is tolerated.
    pub fn evaluate(&self, snapshot: &RegistrySnapshot) -> SessionStatus {
        let mut inner = self.lock();
        if inner.status.is_failed() {
            return inner.status.clone();
        }
        let status = self.derive(&inner, snapshot);
        if status.is_failed() {
            error!(reason = status.message.as_deref().unwrap_or_default(), "session failed");
        } else if !inner.status.is_succeeded() {
            info!("session has no job failures; status SUCCEEDED");
        }
        inner.status = status.clone();
        status
    }

    /// Last evaluated status.
    pub fn status(&self) -> SessionStatus {
        self.lock().status.clone()
    }

    fn derive(&self, inner: &PolicyInner, snapshot: &RegistrySnapshot) -> SessionStatus {
        for job in &snapshot.jobs {
            if let Some(slot) = job.empty_slots.first() {
                return SessionStatus::failed(format!(
                    "primary slot {}:{} holds no task",
                    job.job, slot
                ));
            }
        }

        let allowed = |job: JobName| {
            snapshot.job(job).map_or(0, |j| {
                self.max_failures_allowed(job, j.primary_slots, j.standby_queue)
            })
        };

        let failed_ps = inner.failed_ps.len();
        let allowed_ps = allowed(JobName::Ps);
        if failed_ps > allowed_ps {
            return SessionStatus::failed(format!(
                "too many parameter servers failed (failed={failed_ps}, allowed={allowed_ps})"
            ));
        }

        let failed_workers = inner.failed_workers.len();
        let allowed_workers = allowed(JobName::Worker);
        if failed_workers > allowed_workers {
            let mut message = format!(
                "too many workers failed (failed={failed_workers}, allowed={allowed_workers})"
            );
            if !inner.chief_success {
                message.push_str("; chief worker failed");
            }
            return SessionStatus::failed(message);
        }

        if !inner.chief_success {
            return SessionStatus::failed("chief worker failed");
        }
        SessionStatus::succeeded()
    }

    fn lock(&self) -> MutexGuard<'_, PolicyInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobSnapshot;
    use tfam_model::FinalStatus;

    fn job(job: JobName, primaries: usize, standbys: usize) -> JobSnapshot {
        JobSnapshot {
            job,
            primary_slots: primaries,
            filled_primaries: primaries,
            pending_primaries: 0,
            pending_backups: 0,
            standby_queue: standbys,
            empty_slots: Vec::new(),
            failed_slots: Vec::new(),
            succeeded_slots: Vec::new(),
        }
    }

    fn snapshot(ps: (usize, usize), worker: (usize, usize)) -> RegistrySnapshot {
        RegistrySnapshot {
            jobs: vec![job(JobName::Ps, ps.0, ps.1), job(JobName::Worker, worker.0, worker.1)],
        }
    }

    fn policy() -> FaultPolicy {
        FaultPolicy::new(&SessionConfig::default())
    }

    #[test]
    fn tolerance_grows_with_standbys() {
        let p = policy();
        assert_eq!(p.max_failures_allowed(JobName::Worker, 10, 1), 2);
        assert_eq!(p.max_failures_allowed(JobName::Worker, 10, 0), 1);
        assert_eq!(p.max_failures_allowed(JobName::Worker, 5, 0), 0);
        assert_eq!(p.max_failures_allowed(JobName::Ps, 4, 2), 2);
    }

    #[test]
    fn no_failures_succeeds() {
        let p = policy();
        let status = p.evaluate(&snapshot((2, 0), (3, 0)));
        assert_eq!(status.final_status, FinalStatus::Succeeded);
        assert_eq!(p.status(), status);
    }

    #[test]
    fn chief_failure_fails_session() {
        let p = policy();
        p.record_failure(JobName::Worker, 0, 0, true);
        let status = p.evaluate(&snapshot((2, 0), (10, 1)));
        assert!(status.is_failed());
        assert_eq!(status.message.as_deref(), Some("chief worker failed"));
        assert!(!p.chief_succeeded());
    }

    #[test]
    fn chief_failure_is_named_even_when_threshold_trips() {
        let p = policy();
        p.record_failure(JobName::Worker, 0, 0, true);
        let status = p.evaluate(&snapshot((1, 0), (3, 0)));
        assert!(status.is_failed());
        assert!(status.message.unwrap().contains("chief worker failed"));
    }

    #[test]
    fn any_ps_failure_fails_with_zero_threshold() {
        let p = policy();
        p.record_failure(JobName::Ps, 1, 1, false);
        let status = p.evaluate(&snapshot((2, 0), (3, 0)));
        assert!(status.is_failed());
        assert!(status.message.unwrap().contains("parameter servers"));
    }

    #[test]
    fn worker_failures_within_tolerance_succeed() {
        let p = policy();
        p.record_failure(JobName::Worker, 3, 3, false);
        p.record_failure(JobName::Worker, 3, 3, false);
        assert_eq!(p.failed(JobName::Worker), vec![3]);
        assert!(p.evaluate(&snapshot((1, 0), (10, 0))).is_succeeded());

        p.record_failure(JobName::Worker, 4, 4, false);
        assert!(p.evaluate(&snapshot((1, 0), (10, 0))).is_failed());
    }

    #[test]
    fn failed_is_never_overwritten() {
        let p = policy();
        p.record_failure(JobName::Ps, 0, 0, false);
        assert!(p.evaluate(&snapshot((1, 0), (1, 0))).is_failed());

        assert!(p.withdraw(JobName::Ps, 0, 0));
        let status = p.evaluate(&snapshot((1, 0), (1, 0)));
        assert!(status.is_failed());
        assert!(status.message.unwrap().contains("parameter servers"));
    }

    #[test]
    fn empty_slot_fails_fast() {
        let p = policy();
        let mut snap = snapshot((1, 0), (3, 0));
        snap.jobs[1].empty_slots = vec![2];
        let status = p.evaluate(&snap);
        assert!(status.is_failed());
        assert_eq!(status.message.as_deref(), Some("primary slot worker:2 holds no task"));
    }

    #[test]
    fn withdraw_unknown_slot_is_noop() {
        let p = policy();
        assert!(!p.withdraw(JobName::Worker, 5, 5));
    }

    #[test]
    fn withdraw_keeps_failure_of_the_new_occupant() {
        let p = policy();
        p.record_failure(JobName::Worker, 1, 1, false);
        // Promoted standby 3 takes slot 1 and fails before the withdrawal lands.
        p.record_failure(JobName::Worker, 1, 3, false);
        assert_eq!(p.failed(JobName::Worker), vec![1, 1]);

        assert!(p.withdraw(JobName::Worker, 1, 1));
        assert_eq!(p.failed(JobName::Worker), vec![1]);
        assert!(!p.withdraw(JobName::Worker, 1, 1));
        assert!(p.evaluate(&snapshot((1, 0), (3, 0))).is_failed());
    }
}
