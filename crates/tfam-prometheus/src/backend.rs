use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder, proto::MetricFamily};

use tfam_core::{CompletionOutcomeKind, MetricsBackend};
use tfam_model::JobName;

/// Session metrics registered on their own [`Registry`].
///
/// Cloning is cheap; clones share the same collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    containers_granted: IntCounterVec,
    tasks_completed: IntCounterVec,
    standby_promotions: IntCounterVec,
    ready_endpoints: IntGauge,
    cluster_published: IntCounter,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register the collectors on an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let containers_granted = IntCounterVec::new(
            Opts::new("tfam_containers_granted_total", "Containers bound to a task slot"),
            &["job"],
        )?;
        let tasks_completed = IntCounterVec::new(
            Opts::new("tfam_tasks_completed_total", "Completion reports by classification"),
            &["job", "outcome"],
        )?;
        let standby_promotions = IntCounterVec::new(
            Opts::new("tfam_standby_promotions_total", "Standbys promoted into primary slots"),
            &["job"],
        )?;
        let ready_endpoints = IntGauge::new("tfam_cluster_ready_endpoints", "Registered task endpoints")?;
        let cluster_published = IntCounter::new("tfam_cluster_published_total", "Cluster spec publications")?;

        registry.register(Box::new(containers_granted.clone()))?;
        registry.register(Box::new(tasks_completed.clone()))?;
        registry.register(Box::new(standby_promotions.clone()))?;
        registry.register(Box::new(ready_endpoints.clone()))?;
        registry.register(Box::new(cluster_published.clone()))?;

        Ok(Self {
            registry,
            containers_granted,
            tasks_completed,
            standby_promotions,
            ready_endpoints,
            cluster_published,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready to serve on `/metrics`.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_container_granted(&self, job: JobName) {
        self.containers_granted.with_label_values(&[job.as_str()]).inc();
    }

    fn record_task_completed(&self, job: JobName, outcome: CompletionOutcomeKind) {
        self.tasks_completed
            .with_label_values(&[job.as_str(), outcome.as_str()])
            .inc();
    }

    fn record_standby_promoted(&self, job: JobName) {
        self.standby_promotions.with_label_values(&[job.as_str()]).inc();
    }

    fn set_ready_endpoints(&self, ready: usize) {
        self.ready_endpoints.set(i64::try_from(ready).unwrap_or(i64::MAX));
    }

    fn record_cluster_published(&self) {
        self.cluster_published.inc();
    }
}
