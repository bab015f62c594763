//! Orchestration of one training session.
//!
//! Container grants, endpoint registrations and completion reports arrive from
//! independent sources in any interleaving. Each handler goes through the
//! registry, the cluster builder or the policy, which guard their own state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use tfam_model::{
    ClusterSpec, CompletionReport, Container, EndpointRegistered, JobCatalog, JobName, SessionPhase,
    SessionStatus, Task,
};

use crate::{
    cluster::{self, ClusterSpecBuilder, Registration},
    config::SessionConfig,
    context::SessionContext,
    error::CoreError,
    metrics::{MetricsBackend, NoopMetrics},
    policy::FaultPolicy,
    registry::{CompletionOutcome, TaskRegistry},
    resources::{NodeManager, ResourceManager},
    store::{CoordinationStore, StoreEvent, decode_endpoint},
};

/// Session state machine: `Initializing -> Scheduling -> Running -> {Succeeded | Failed}`.
pub struct SessionCoordinator {
    ctx: SessionContext,
    catalog: JobCatalog,
    config: SessionConfig,
    registry: TaskRegistry,
    cluster: ClusterSpecBuilder,
    policy: FaultPolicy,
    store: Arc<dyn CoordinationStore>,
    metrics: Arc<dyn MetricsBackend>,
    phase: Mutex<SessionPhase>,
    promotion: AsyncMutex<()>,
}

impl SessionCoordinator {
    /// New session over `catalog`.
    ///
    /// `partitions[i]` is the training data assigned to primary worker `i`.
    pub fn new(
        ctx: SessionContext,
        catalog: JobCatalog,
        config: SessionConfig,
        partitions: Vec<String>,
        store: Arc<dyn CoordinationStore>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(CoreError::InvalidConfig("job catalog declares no jobs".into()));
        }

        let registry = TaskRegistry::new(&catalog, ctx.session_id().clone(), partitions);
        let cluster = ClusterSpecBuilder::new(&catalog);
        let policy = FaultPolicy::new(&config);
        info!(
            session = %ctx.session_id(),
            host = ctx.host(),
            containers = catalog.total_containers(),
            "session created"
        );

        Ok(Self {
            ctx,
            catalog,
            config,
            registry,
            cluster,
            policy,
            store,
            metrics: Arc::new(NoopMetrics),
            phase: Mutex::new(SessionPhase::Initializing),
            promotion: AsyncMutex::new(()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Request every primary and standby container of the catalog, in declaration order.
    #[instrument(level = "info", skip_all, fields(session = %self.ctx.session_id()))]
    pub async fn schedule<R>(&self, resources: &R) -> Result<(), CoreError>
    where
        R: ResourceManager + ?Sized,
    {
        self.set_phase(SessionPhase::Scheduling);
        for spec in self.catalog.iter() {
            let count = spec.total_slots();
            info!(
                job = %spec.job_name,
                count,
                memory_mb = spec.memory_mb,
                vcores = spec.vcores,
                priority = spec.priority,
                "requesting containers"
            );
            resources.request_containers(spec, count).await?;
        }
        Ok(())
    }

    /// Bind a granted container and watch the key its task will publish its endpoint to.
    #[instrument(level = "debug", skip(self, container), fields(container = %container.id))]
    pub async fn on_container_granted(&self, container: Container) -> Result<Task, CoreError> {
        let task = self.registry.assign(container).inspect_err(|e| {
            error!(error = %e, "granted container matches no pending slot");
        })?;

        let key = self.config.layout.endpoint_key(&task.container.id);
        self.store.watch(&key).await?;
        debug!(%key, "watching endpoint key");
        self.metrics.record_container_granted(task.job_name);

        if self.registry.bound_count() == self.catalog.total_containers() {
            info!(containers = self.catalog.total_containers(), "every requested container bound");
            self.set_phase(SessionPhase::Running);
        }
        Ok(task)
    }

    /// Decode a raw store notification and register the endpoint it carries.
    ///
    /// Notifications for keys that are not endpoint keys are ignored.
    pub async fn on_store_event(&self, event: &StoreEvent) -> Result<Option<Registration>, CoreError> {
        let Some(registered) = decode_endpoint(self.store.as_ref(), &self.config.layout, event).await? else {
            debug!(path = event.path(), "ignoring notification for foreign key");
            return Ok(None);
        };
        self.on_endpoint_registered(registered).await.map(Some)
    }

    /// Record the endpoint of the task running in `event.container_id`.
    ///
    /// Publishes the cluster spec when this registration completes it.
    #[instrument(level = "debug", skip(self, event), fields(container = %event.container_id))]
    pub async fn on_endpoint_registered(&self, event: EndpointRegistered) -> Result<Registration, CoreError> {
        let task = self
            .registry
            .lookup_by_container(&event.container_id)
            .ok_or_else(|| CoreError::UnknownContainer(event.container_id.clone()))?;

        let registration = self.cluster.register(task.job_name, task.task_index, &event.endpoint)?;
        self.metrics.set_ready_endpoints(self.cluster.ready());

        if let Registration::Completed(payload) = &registration {
            cluster::publish(self.store.as_ref(), &self.config.layout, payload)
                .await
                .inspect_err(|e| error!(error = %e, "cluster spec publication failed"))?;
            self.metrics.record_cluster_published();
        }
        Ok(registration)
    }

    /// Record a task's exit code.
    ///
    /// A queued standby that terminates is dropped without touching the policy.
    /// Callers re-evaluate with [`SessionCoordinator::evaluate`].
    #[instrument(
        level = "debug",
        skip(self, report),
        fields(job = %report.job_name, task_index = report.task_index, exit_code = report.exit_code)
    )]
    pub fn on_task_completed(&self, report: CompletionReport) -> Result<CompletionOutcome, CoreError> {
        let CompletionReport { job_name: job, task_index, exit_code } = report;
        let outcome = self.registry.record_completion(job, task_index, exit_code)?;

        let kind = outcome.kind();
        match &outcome {
            CompletionOutcome::Primary(task) if task.failed() => {
                let slot = task.array_index.unwrap_or(task.task_index);
                warn!(slot, "primary task failed");
                self.policy.record_failure(job, slot, task.task_index, job.is_chief(slot));
            }
            CompletionOutcome::Primary(_) => info!("primary task succeeded"),
            CompletionOutcome::StandbyDropped(_) | CompletionOutcome::Duplicate => {}
        }
        self.metrics.record_task_completed(job, kind);
        Ok(outcome)
    }

    /// Returns `true` if `job` has a queued standby to promote.
    pub fn can_promote(&self, job: JobName) -> bool {
        self.registry.standby_count(job) > 0
    }

    /// Move the head of `job`'s standby queue into primary slot `failed_slot`.
    ///
    /// The inherited data partition is written to the standby's partition key
    /// before the slot is replaced, which wakes the standby up.
    #[instrument(level = "info", skip(self), fields(job = %job))]
    pub async fn promote_standby(&self, job: JobName, failed_slot: usize) -> Result<Task, CoreError> {
        let _serial = self.promotion.lock().await;

        let standby = self
            .registry
            .peek_standby(job)
            .ok_or(CoreError::NoStandbyAvailable(job))?;
        let failed = self.registry.primary_at(job, failed_slot).ok_or_else(|| {
            let len = self.catalog.primary_slots(job);
            if failed_slot < len {
                CoreError::SlotEmpty { job, index: failed_slot }
            } else {
                CoreError::IndexOutOfRange { job, index: failed_slot, len }
            }
        })?;
        if !failed.failed() {
            warn!(slot = failed_slot, exit_status = ?failed.exit_status, "promoting over a task that has not failed");
        }

        let key = self.config.layout.data_partition_key(&standby.container.id);
        let partition = failed.data_partition.as_deref().unwrap_or_default();
        self.store.put(&key, partition.as_bytes()).await?;
        debug!(%key, partition, "standby woken up");

        let promoted = self.registry.promote(job, failed_slot, &standby.container.id)?;
        if self.policy.withdraw(job, failed_slot, failed.task_index) {
            debug!(slot = failed_slot, "failure withdrawn after promotion");
        }
        self.metrics.record_standby_promoted(job);
        Ok(promoted)
    }

    /// Re-derive the session status from a consistent registry snapshot.
    pub fn evaluate(&self) -> SessionStatus {
        let snapshot = self.registry.snapshot();
        let status = self.policy.evaluate(&snapshot);
        if status.is_failed() {
            self.set_phase(SessionPhase::Failed);
        } else if status.is_succeeded() && snapshot.all_primaries_finished() {
            self.set_phase(SessionPhase::Succeeded);
        }
        status
    }

    /// Last evaluated status.
    pub fn final_status(&self) -> SessionStatus {
        self.policy.status()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.lock_phase()
    }

    /// Stop every container ever bound in this session.
    ///
    /// Every container is attempted; the first failure is returned.
    #[instrument(level = "info", skip_all, fields(session = %self.ctx.session_id()))]
    pub async fn stop_all<N>(&self, nodes: &N) -> Result<(), CoreError>
    where
        N: NodeManager + ?Sized,
    {
        let mut first_err = None;
        for container in self.registry.containers() {
            debug!(container = %container.id, node = %container.node_address, "stopping container");
            if let Err(e) = nodes.stop_container(&container.id, &container.node_address).await {
                warn!(container = %container.id, error = %e, "failed to stop container");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Drive [`SessionCoordinator::on_store_event`] until `token` is cancelled or
    /// the store's channel closes. Returns the first error.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<StoreEvent>,
        token: CancellationToken,
    ) -> Result<(), CoreError> {
        info!(session = %self.ctx.session_id(), "session event loop started");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("session event loop cancelled");
                    return Ok(());
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("store event channel closed");
                        return Ok(());
                    };
                    if let Err(e) = self.on_store_event(&event).await {
                        error!(path = event.path(), error = %e, "store event handling failed");
                        return Err(e);
                    }
                }
            }
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn catalog(&self) -> &JobCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn cluster(&self) -> &ClusterSpecBuilder {
        &self.cluster
    }

    pub fn policy(&self) -> &FaultPolicy {
        &self.policy
    }

    /// Current cluster spec, complete or not.
    pub fn cluster_spec(&self) -> ClusterSpec {
        self.cluster.snapshot()
    }

    /// Primary workers that finished with exit code 0.
    pub fn completed_workers(&self) -> usize {
        self.registry.completed_workers()
    }

    fn set_phase(&self, next: SessionPhase) {
        let mut phase = self.lock_phase();
        if phase.is_terminal() || *phase == next {
            return;
        }
        info!(from = ?*phase, to = ?next, "session phase changed");
        *phase = next;
    }

    fn lock_phase(&self) -> MutexGuard<'_, SessionPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
