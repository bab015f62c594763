use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use tfam_core::{
    CompletionOutcome, CoordinationStore, CoreError, MemoryStore, NodeManager, Registration, ResourceManager, SessionConfig,
    SessionContext, SessionCoordinator, StoreEvent, StoreLayout,
};
use tfam_model::{
    ClusterSpec, CompletionReport, Container, ContainerId, EndpointRegistered, FinalStatus, JobCatalog, JobName,
    JobSpec, SessionId, SessionPhase,
};

struct Harness {
    coordinator: Arc<SessionCoordinator>,
    store: Arc<MemoryStore>,
    events: UnboundedReceiver<StoreEvent>,
    layout: StoreLayout,
}

fn catalog(ps: (usize, usize), worker: (usize, usize)) -> JobCatalog {
    JobCatalog::new(vec![
        JobSpec::new(JobName::Ps, 1024, 1).with_slots(ps.0, ps.1),
        JobSpec::new(JobName::Worker, 1024, 1).with_slots(worker.0, worker.1),
    ])
    .unwrap()
}

fn harness(ps: (usize, usize), worker: (usize, usize)) -> Harness {
    let (store, events) = MemoryStore::new();
    let store = Arc::new(store);
    let partitions = (0..worker.0).map(|i| format!("hdfs://data/part-{i:05}")).collect();
    let coordinator = SessionCoordinator::new(
        SessionContext::with_id(SessionId::from("session-test")),
        catalog(ps, worker),
        SessionConfig::default(),
        partitions,
        store.clone(),
    )
    .unwrap();
    Harness {
        coordinator: Arc::new(coordinator),
        store,
        events,
        layout: StoreLayout::default(),
    }
}

fn container(n: usize) -> Container {
    Container::new(ContainerId::from(format!("container_{n:03}")), format!("node-{}:8042", n % 3), 1024, 1)
}

async fn grant_all(h: &Harness, count: usize) {
    for n in 0..count {
        h.coordinator.on_container_granted(container(n)).await.unwrap();
    }
}

fn complete(h: &Harness, job: JobName, index: usize, exit_code: i32) -> CompletionOutcome {
    h.coordinator
        .on_task_completed(CompletionReport::new(job, index, exit_code))
        .unwrap()
}

#[tokio::test]
async fn grants_fill_primaries_then_backups_then_fail() {
    let h = harness((2, 0), (3, 1));
    let mut bound = Vec::new();
    for n in 0..6 {
        let task = h.coordinator.on_container_granted(container(n)).await.unwrap();
        assert!(h.store.is_watched(&h.layout.endpoint_key(&task.container.id)));
        bound.push((task.job_name, task.task_index, task.is_backup));
    }
    assert_eq!(
        bound,
        vec![
            (JobName::Ps, 0, false),
            (JobName::Ps, 1, false),
            (JobName::Worker, 0, false),
            (JobName::Worker, 1, false),
            (JobName::Worker, 2, false),
            (JobName::Worker, 3, true),
        ]
    );
    assert_eq!(h.coordinator.phase(), SessionPhase::Running);

    let err = h.coordinator.on_container_granted(container(6)).await.unwrap_err();
    assert!(matches!(err, CoreError::NoMatchingJob { .. }));
    assert!(!h.store.is_watched(&h.layout.endpoint_key(&container(6).id)));
}

#[tokio::test]
async fn chief_failure_fails_the_session() {
    let h = harness((2, 0), (10, 1));
    grant_all(&h, 13).await;

    for i in 1..10 {
        complete(&h, JobName::Worker, i, 0);
    }
    complete(&h, JobName::Ps, 0, 0);
    complete(&h, JobName::Ps, 1, 0);
    complete(&h, JobName::Worker, 0, 137);

    let status = h.coordinator.evaluate();
    assert_eq!(status.final_status, FinalStatus::Failed);
    assert!(status.message.unwrap().contains("chief"));
    assert_eq!(h.coordinator.phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn two_worker_failures_with_one_promotion_succeed() {
    let h = harness((1, 0), (10, 1));
    grant_all(&h, 12).await;
    assert_eq!(
        h.coordinator.policy().max_failures_allowed(JobName::Worker, 10, 1),
        2
    );

    complete(&h, JobName::Worker, 3, 1);
    assert!(h.coordinator.evaluate().is_succeeded());
    assert!(h.coordinator.can_promote(JobName::Worker));
    let promoted = h.coordinator.promote_standby(JobName::Worker, 3).await.unwrap();
    assert_eq!(promoted.array_index, Some(3));

    complete(&h, JobName::Worker, 5, 1);
    assert!(!h.coordinator.can_promote(JobName::Worker));

    complete(&h, JobName::Ps, 0, 0);
    for i in [0, 1, 2, 4, 6, 7, 8, 9] {
        complete(&h, JobName::Worker, i, 0);
    }
    complete(&h, JobName::Worker, promoted.task_index, 0);

    let status = h.coordinator.evaluate();
    assert_eq!(status.final_status, FinalStatus::Succeeded, "{status:?}");
    assert_eq!(h.coordinator.final_status(), status);
    assert_eq!(h.coordinator.phase(), SessionPhase::Succeeded);
    assert_eq!(h.coordinator.completed_workers(), 9);
}

#[tokio::test]
async fn exceeding_worker_tolerance_fails() {
    let h = harness((1, 0), (10, 0));
    grant_all(&h, 11).await;
    complete(&h, JobName::Worker, 4, 1);
    assert!(h.coordinator.evaluate().is_succeeded());
    complete(&h, JobName::Worker, 6, 1);
    let status = h.coordinator.evaluate();
    assert!(status.is_failed());
    assert!(status.message.unwrap().contains("too many workers failed"));
}

#[tokio::test]
async fn failed_status_is_never_overwritten() {
    let h = harness((1, 0), (2, 0));
    grant_all(&h, 3).await;
    complete(&h, JobName::Ps, 0, 2);
    assert!(h.coordinator.evaluate().is_failed());

    complete(&h, JobName::Worker, 0, 0);
    complete(&h, JobName::Worker, 1, 0);
    let status = h.coordinator.evaluate();
    assert!(status.is_failed());
    assert_eq!(h.coordinator.phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn evaluating_with_unfilled_slot_fails_fast() {
    let h = harness((1, 0), (2, 0));
    grant_all(&h, 2).await;
    let status = h.coordinator.evaluate();
    assert!(status.is_failed());
    assert!(status.message.unwrap().contains("worker:1"));
}

#[tokio::test]
async fn standby_failure_is_absorbed() {
    let h = harness((1, 0), (2, 1));
    grant_all(&h, 4).await;

    let outcome = complete(&h, JobName::Worker, 2, 9);
    assert!(matches!(outcome, CompletionOutcome::StandbyDropped(_)));
    assert!(!h.coordinator.can_promote(JobName::Worker));
    assert!(h.coordinator.policy().failed(JobName::Worker).is_empty());
    assert!(h.coordinator.evaluate().is_succeeded());
}

#[tokio::test]
async fn duplicate_completion_is_not_double_counted() {
    let h = harness((1, 0), (10, 0));
    grant_all(&h, 11).await;
    complete(&h, JobName::Worker, 2, 1);
    assert_eq!(complete(&h, JobName::Worker, 2, 1), CompletionOutcome::Duplicate);
    assert_eq!(h.coordinator.policy().failed(JobName::Worker), vec![2]);
    assert!(h.coordinator.evaluate().is_succeeded());

    let err = h
        .coordinator
        .on_task_completed(CompletionReport::new(JobName::Ps, 5, 0))
        .unwrap_err();
    assert!(matches!(err, CoreError::TaskNotFound { .. }));
}

#[tokio::test]
async fn promotion_carries_partition_and_wakes_standby() {
    let h = harness((1, 0), (3, 2));
    grant_all(&h, 6).await;
    complete(&h, JobName::Worker, 1, 1);

    let standby = h.coordinator.registry().peek_standby(JobName::Worker).unwrap();
    let promoted = h.coordinator.promote_standby(JobName::Worker, 1).await.unwrap();

    assert_eq!(promoted.container.id, standby.container.id);
    assert_eq!(promoted.data_partition.as_deref(), Some("hdfs://data/part-00001"));
    assert!(!promoted.is_backup);
    assert_eq!(
        h.store.value(&h.layout.data_partition_key(&standby.container.id)),
        Some(b"hdfs://data/part-00001".to_vec())
    );
    assert_eq!(h.coordinator.registry().standby_count(JobName::Worker), 1);
    assert!(h.coordinator.policy().failed(JobName::Worker).is_empty());
}

#[tokio::test]
async fn promoted_standby_failure_after_earlier_drop_fails_session() {
    let h = harness((1, 0), (3, 2));
    grant_all(&h, 5).await;
    h.coordinator
        .on_endpoint_registered(EndpointRegistered::new(container(4).id, "10.0.0.4:2222"))
        .await
        .unwrap();

    let dropped = complete(&h, JobName::Worker, 3, 1);
    assert!(matches!(dropped, CompletionOutcome::StandbyDropped(ref t) if t.task_index == 3));

    let late = h.coordinator.on_container_granted(container(5)).await.unwrap();
    assert!(late.is_backup);
    assert_eq!(late.task_index, 4);
    assert_eq!(h.coordinator.phase(), SessionPhase::Running);
    let registration = h
        .coordinator
        .on_endpoint_registered(EndpointRegistered::new(late.container.id.clone(), "10.0.0.5:2222"))
        .await
        .unwrap();
    assert!(matches!(registration, Registration::Recorded { ready: 2, .. }));

    complete(&h, JobName::Worker, 1, 1);
    assert!(h.coordinator.evaluate().is_succeeded());
    let promoted = h.coordinator.promote_standby(JobName::Worker, 1).await.unwrap();
    assert_eq!(promoted.container.id, late.container.id);
    assert!(h.coordinator.policy().failed(JobName::Worker).is_empty());

    let outcome = complete(&h, JobName::Worker, promoted.task_index, 1);
    assert!(matches!(outcome, CompletionOutcome::Primary(ref t) if t.failed()));
    assert_eq!(h.coordinator.policy().failed(JobName::Worker), vec![1]);
    assert_eq!(
        h.coordinator.registry().primary_at(JobName::Worker, 1).unwrap().exit_status,
        Some(1)
    );

    let status = h.coordinator.evaluate();
    assert!(status.is_failed(), "{status:?}");
    assert!(status.message.unwrap().contains("too many workers failed"));
    assert_eq!(h.coordinator.phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn promotion_without_standby_is_typed() {
    let h = harness((1, 0), (2, 0));
    grant_all(&h, 3).await;
    complete(&h, JobName::Worker, 1, 1);
    assert!(!h.coordinator.can_promote(JobName::Worker));
    let err = h.coordinator.promote_standby(JobName::Worker, 1).await.unwrap_err();
    assert!(matches!(err, CoreError::NoStandbyAvailable(JobName::Worker)));
}

#[tokio::test]
async fn promotion_into_unknown_slot_is_rejected() {
    let h = harness((1, 0), (2, 1));
    grant_all(&h, 4).await;
    let err = h.coordinator.promote_standby(JobName::Worker, 7).await.unwrap_err();
    assert!(matches!(err, CoreError::IndexOutOfRange { index: 7, len: 2, .. }));
}

#[tokio::test]
async fn cluster_spec_is_published_once_when_complete() {
    let mut h = harness((2, 0), (3, 1));
    grant_all(&h, 6).await;
    let final_key = h.layout.final_cluster_key().to_string();

    for n in 0..6 {
        let key = h.layout.endpoint_key(&container(n).id);
        h.store.put(&key, format!("10.0.0.{n}:2222").as_bytes()).await.unwrap();
        let event = h.events.recv().await.unwrap();
        let registration = h.coordinator.on_store_event(&event).await.unwrap().unwrap();
        if n < 5 {
            assert_eq!(registration, Registration::Recorded { ready: n + 1, expected: 6 });
            assert!(!h.coordinator.cluster().is_complete());
            assert_eq!(h.store.write_count(&final_key), 0);
        } else {
            assert!(matches!(registration, Registration::Completed(_)));
        }
    }
    assert_eq!(h.store.write_count(&final_key), 1);

    let published: ClusterSpec = serde_json::from_slice(&h.store.value(&final_key).unwrap()).unwrap();
    assert_eq!(published.ps[1].as_deref(), Some("10.0.0.1:2222"));
    assert_eq!(published.worker[0].as_deref(), Some("10.0.0.2:2222"));
    assert_eq!(published.worker[3].as_deref(), Some("10.0.0.5:2222"));

    let repeat = h
        .coordinator
        .on_endpoint_registered(EndpointRegistered::new(container(5).id, "10.0.0.5:2222"))
        .await
        .unwrap();
    assert_eq!(repeat, Registration::Duplicate);
    assert_eq!(h.store.write_count(&final_key), 1);
}

#[tokio::test]
async fn endpoint_for_unbound_container_is_rejected() {
    let h = harness((1, 0), (1, 0));
    let err = h
        .coordinator
        .on_endpoint_registered(EndpointRegistered::new(ContainerId::from("stranger"), "h:1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownContainer(_)));
}

#[tokio::test]
async fn event_loop_publishes_and_stops_on_cancel() {
    let h = harness((1, 0), (2, 0));
    grant_all(&h, 3).await;

    let token = CancellationToken::new();
    let coordinator = Arc::clone(&h.coordinator);
    let loop_token = token.clone();
    let events = h.events;
    let handle = tokio::spawn(async move { coordinator.run(events, loop_token).await });

    // an unrelated, unwatched key never reaches the loop
    h.store.put("/tensorflow/other", b"x").await.unwrap();
    for n in 0..3 {
        let key = h.layout.endpoint_key(&container(n).id);
        h.store.put(&key, b"10.1.0.1:2222").await.unwrap();
    }

    let final_key = h.layout.final_cluster_key().to_string();
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.store.write_count(&final_key) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("cluster spec published");

    token.cancel();
    handle.await.unwrap().unwrap();
    assert_eq!(h.store.write_count(&final_key), 1);
}

#[tokio::test]
async fn store_outage_surfaces_on_grant() {
    let h = harness((1, 0), (1, 0));
    h.store.set_unavailable(true);
    let err = h.coordinator.on_container_granted(container(0)).await.unwrap_err();
    assert!(matches!(err, CoreError::Store(_)));
}

#[derive(Default)]
struct RecordingResources {
    requests: Mutex<Vec<(JobName, usize)>>,
}

#[async_trait]
impl ResourceManager for RecordingResources {
    async fn request_containers(&self, spec: &JobSpec, count: usize) -> Result<(), CoreError> {
        self.requests.lock().unwrap().push((spec.job_name, count));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNodes {
    stopped: Mutex<Vec<(ContainerId, String)>>,
}

#[async_trait]
impl NodeManager for RecordingNodes {
    async fn stop_container(&self, id: &ContainerId, node_address: &str) -> Result<(), CoreError> {
        self.stopped.lock().unwrap().push((id.clone(), node_address.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn schedule_requests_every_slot_in_catalog_order() {
    let h = harness((2, 0), (3, 1));
    assert_eq!(h.coordinator.phase(), SessionPhase::Initializing);

    let resources = RecordingResources::default();
    h.coordinator.schedule(&resources).await.unwrap();
    assert_eq!(
        *resources.requests.lock().unwrap(),
        vec![(JobName::Ps, 2), (JobName::Worker, 4)]
    );
    assert_eq!(h.coordinator.phase(), SessionPhase::Scheduling);

    grant_all(&h, 6).await;
    assert_eq!(h.coordinator.phase(), SessionPhase::Running);
}

#[tokio::test]
async fn stop_all_covers_retired_containers() {
    let h = harness((1, 0), (2, 1));
    grant_all(&h, 4).await;
    complete(&h, JobName::Worker, 0, 1);
    h.coordinator.promote_standby(JobName::Worker, 0).await.unwrap();

    let nodes = RecordingNodes::default();
    h.coordinator.stop_all(&nodes).await.unwrap();
    let stopped = nodes.stopped.lock().unwrap();
    assert_eq!(stopped.len(), 4);
    assert!(stopped.iter().any(|(id, node)| *id == container(1).id && node == "node-1:8042"));
}

#[test]
fn empty_catalog_is_rejected() {
    let (store, _rx) = MemoryStore::new();
    let err = SessionCoordinator::new(
        SessionContext::new(),
        JobCatalog::new(Vec::new()).unwrap(),
        SessionConfig::default(),
        Vec::new(),
        Arc::new(store),
    )
    .err()
    .unwrap();
    assert!(matches!(err, CoreError::InvalidConfig(_)));
}

#[test]
fn invalid_threshold_is_rejected() {
    let (store, _rx) = MemoryStore::new();
    let err = SessionCoordinator::new(
        SessionContext::new(),
        catalog((1, 0), (1, 0)),
        SessionConfig::default().with_thresholds(1.5, 0.1),
        Vec::new(),
        Arc::new(store),
    )
    .err()
    .unwrap();
    assert!(matches!(err, CoreError::InvalidConfig(_)));
}
