//! Simulated training session: a fake cluster grants containers, fake task
//! executors publish endpoints and report exit codes, one worker fails and is
//! replaced by its standby.
//!
//! `curl localhost:8080/api/v1/session` while it runs.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::routing::get;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tfam_api::{ApiHandler, HttpApi, SessionApiAdapter};
use tfam_core::{
    CoordinationStore, CoreError, MemoryStore, NodeManager, ResourceManager, SessionConfig, SessionContext,
    SessionCoordinator,
};
use tfam_model::{CompletionReport, Container, ContainerId, JobCatalog, JobName, JobSpec, Task};
use tfam_observe::{LoggerConfig, logger_init};
use tfam_prometheus::PrometheusMetrics;

/// Worker whose first run fails.
const FAILING_WORKER: usize = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    logger_init(&LoggerConfig::from_env()?)?;
    info!("logger initialized");

    // 2) Session
    let catalog = JobCatalog::new(vec![
        JobSpec::new(JobName::Ps, 2048, 1).with_slots(1, 0),
        JobSpec::new(JobName::Worker, 4096, 2).with_slots(4, 1),
    ])?;
    let partitions = (0..4).map(|i| format!("hdfs:///data/train/part-{i:05}")).collect();
    let (store, events) = MemoryStore::new();
    let store = Arc::new(store);
    let metrics = PrometheusMetrics::new()?;

    let coordinator = Arc::new(
        SessionCoordinator::new(
            SessionContext::new(),
            catalog,
            SessionConfig::default(),
            partitions,
            store.clone(),
        )?
        .with_metrics(Arc::new(metrics.clone())),
    );
    let api = Arc::new(SessionApiAdapter::new(Arc::clone(&coordinator)));

    // 3) Store watch loop
    let token = CancellationToken::new();
    let watch_loop = {
        let coordinator = Arc::clone(&coordinator);
        let token = token.clone();
        tokio::spawn(async move { coordinator.run(events, token).await })
    };

    // 4) HTTP surface
    let addr = std::env::var("TFAM_DEMO_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let router = HttpApi::new(Arc::clone(&api)).router().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move { metrics.encode_text().unwrap_or_else(|e| format!("# encode failed: {e}")) }
        }),
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "http api listening");
    let server_token = token.clone();
    tokio::spawn(async move {
        let shutdown = async move { server_token.cancelled().await };
        if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown).await {
            warn!(error = %e, "http server stopped");
        }
    });

    // 5) Schedule and bind grants
    let (grants_tx, mut grants_rx) = mpsc::unbounded_channel();
    let cluster = SimulatedCluster::new(grants_tx);
    coordinator.schedule(&cluster).await?;
    drop(cluster);

    while let Some(container) = grants_rx.recv().await {
        let task = coordinator.on_container_granted(container).await?;
        tokio::spawn(run_task(Arc::clone(&coordinator), Arc::clone(&api), store.clone(), task));
    }

    // 6) Wait for a terminal phase
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if coordinator.phase().is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    let status = coordinator.final_status();
    info!(final_status = ?status.final_status, reason = ?status.message, "session finished");

    // 7) Teardown
    coordinator.stop_all(&SimulatedNodes).await?;
    token.cancel();
    watch_loop.await??;
    Ok(())
}

/// Fake executor: publish the endpoint, then report an exit code.
///
/// Standbys publish and then idle until a promotion wakes them.
async fn run_task(
    coordinator: Arc<SessionCoordinator>,
    api: Arc<SessionApiAdapter>,
    store: Arc<MemoryStore>,
    task: Task,
) {
    let key = coordinator.config().layout.endpoint_key(&task.container.id);
    let host = task.container.node_address.split(':').next().unwrap_or("localhost");
    let endpoint = format!("{host}:{}", 2222 + task.task_index);
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Err(e) = store.put(&key, endpoint.as_bytes()).await {
        warn!(error = %e, "endpoint publication failed");
        return;
    }
    if task.is_backup {
        return;
    }

    tokio::time::sleep(Duration::from_millis(300 + 50 * task.task_index as u64)).await;
    let fails = task.job_name == JobName::Worker && task.task_index == FAILING_WORKER;
    let exit_code = if fails { 1 } else { 0 };
    let report = CompletionReport::new(task.job_name, task.task_index, exit_code);
    if let Err(e) = api.report_completion(report).await {
        warn!(error = %e, "completion report rejected");
        return;
    }

    if fails && coordinator.can_promote(task.job_name) {
        let slot = task.array_index.unwrap_or(task.task_index);
        match coordinator.promote_standby(task.job_name, slot).await {
            Ok(promoted) => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let report = CompletionReport::new(promoted.job_name, promoted.task_index, 0);
                if let Err(e) = api.report_completion(report).await {
                    warn!(error = %e, "completion report rejected");
                }
            }
            Err(e) => warn!(error = %e, "standby promotion failed"),
        }
    }
}

/// Grants every request immediately on three fake nodes.
struct SimulatedCluster {
    grants: mpsc::UnboundedSender<Container>,
    next: AtomicUsize,
}

impl SimulatedCluster {
    fn new(grants: mpsc::UnboundedSender<Container>) -> Self {
        Self {
            grants,
            next: AtomicUsize::new(1),
        }
    }
}

#[async_trait]
impl ResourceManager for SimulatedCluster {
    async fn request_containers(&self, spec: &JobSpec, count: usize) -> Result<(), CoreError> {
        for _ in 0..count {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let container = Container::new(
                ContainerId::new(format!("container_demo_01_{n:06}")),
                format!("10.0.0.{}:8042", n % 3 + 1),
                spec.memory_mb,
                spec.vcores,
            );
            self.grants
                .send(container)
                .map_err(|_| CoreError::ResourceManager("grant channel closed".into()))?;
        }
        Ok(())
    }
}

struct SimulatedNodes;

#[async_trait]
impl NodeManager for SimulatedNodes {
    async fn stop_container(&self, id: &ContainerId, node_address: &str) -> Result<(), CoreError> {
        info!(container = %id, node = node_address, "container stopped");
        Ok(())
    }
}
