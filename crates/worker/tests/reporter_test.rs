mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{unused_port, FakeCoordinator};
use serde_json::json;
use taskfarm_domain::wire;
use taskfarm_domain::{CoordinatorEndpoint, Message, TaskId, TaskOutcome, WorkerId};
use taskfarm_errors::WorkerError;
use taskfarm_worker::{
    Reporter, StatsCollector, SyncProtocol, TaskPool, TcpTransport, Transport, WorkerState,
};

fn transport() -> TcpTransport {
    TcpTransport::new(Duration::from_millis(500))
}

#[tokio::test]
async fn test_result_reaches_coordinator_with_assigned_id() {
    let coordinator = FakeCoordinator::start().await;
    let state = Arc::new(WorkerState::new(7071, None, coordinator.endpoint()));
    let protocol = SyncProtocol::new(Arc::clone(&state), transport(), Duration::from_secs(2));

    let sync = tokio::spawn(async move { protocol.sync().await });
    let (mut stream, _request) = coordinator.accept_message().await;
    wire::write_message(&mut stream, &Message::sync_reply(WorkerId(9)))
        .await
        .unwrap();
    sync.await.unwrap().unwrap();

    let reporter = Reporter::new(Arc::clone(&state), Arc::new(transport()));
    reporter
        .report_result(TaskId(31), TaskOutcome::succeeded(json!("done")), 0.25)
        .await
        .unwrap();

    match coordinator.next_result().await {
        Message::Result(result) => {
            assert_eq!(result.worker_id, WorkerId(9));
            assert_eq!(result.task_id, TaskId(31));
            assert_eq!(result.outcome, TaskOutcome::succeeded(json!("done")));
            assert_eq!(result.cpu_share, 0.25);
        }
        other => panic!("expected RESULT, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stats_reach_coordinator() {
    let coordinator = FakeCoordinator::start().await;
    let state = Arc::new(WorkerState::new(7071, Some(WorkerId(4)), coordinator.endpoint()));
    let protocol = SyncProtocol::new(Arc::clone(&state), transport(), Duration::from_secs(2));

    let sync = tokio::spawn(async move { protocol.sync().await });
    let (mut stream, _request) = coordinator.accept_message().await;
    wire::write_message(&mut stream, &Message::sync_reply(WorkerId(4)))
        .await
        .unwrap();
    sync.await.unwrap().unwrap();

    let (pool, _completions) = TaskPool::new(3).unwrap();
    let snapshot = StatsCollector::with_hostname("node-a").snapshot(&pool);
    let reporter = Reporter::new(Arc::clone(&state), Arc::new(transport()));
    reporter.report_stats(snapshot).await.unwrap();

    let (_stream, message) = coordinator.accept_message().await;
    match message {
        Message::Stats(stats) => {
            assert_eq!(stats.worker_id, WorkerId(4));
            assert_eq!(stats.snapshot.hostname, "node-a");
            assert_eq!(stats.snapshot.pool_size, 3);
            assert_eq!(stats.snapshot.active_tasks, 0);
        }
        other => panic!("expected STATS, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unregistered_worker_does_not_report() {
    let coordinator = FakeCoordinator::start().await;
    let state = Arc::new(WorkerState::new(7071, Some(WorkerId(2)), coordinator.endpoint()));
    let reporter = Reporter::new(state, Arc::new(transport()));

    let err = reporter
        .report_result(TaskId(1), TaskOutcome::failed("x"), 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::NotRegistered));
}

#[tokio::test]
async fn test_report_to_vanished_coordinator_fails_as_transport() {
    let coordinator = FakeCoordinator::start().await;
    let state = Arc::new(WorkerState::new(7071, None, coordinator.endpoint()));
    let protocol = SyncProtocol::new(Arc::clone(&state), transport(), Duration::from_secs(2));

    let sync = tokio::spawn(async move { protocol.sync().await });
    let (mut stream, _request) = coordinator.accept_message().await;
    wire::write_message(&mut stream, &Message::sync_reply(WorkerId(6)))
        .await
        .unwrap();
    sync.await.unwrap().unwrap();
    drop(stream);
    drop(coordinator);

    let (pool, _completions) = TaskPool::new(2).unwrap();
    let reporter = Reporter::new(Arc::clone(&state), Arc::new(transport()));

    let started = Instant::now();
    let err = reporter
        .report_result(TaskId(1), TaskOutcome::failed("x"), 0.0)
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(started.elapsed() < Duration::from_millis(500));

    let err = reporter
        .report_stats(StatsCollector::with_hostname("node-a").snapshot(&pool))
        .await
        .unwrap_err();
    assert!(err.is_transport());

    assert_eq!(pool.active_tasks(), 0);
    assert_eq!(pool.available_slots(), 2);
    assert!(state.is_registered().await);
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_fast() {
    let endpoint = CoordinatorEndpoint::new("127.0.0.1", unused_port().await);

    let started = Instant::now();
    let err = transport()
        .send(&endpoint, &Message::result(WorkerId(1), TaskId(1), TaskOutcome::failed("x"), 0.0))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert!(started.elapsed() < Duration::from_millis(500));
}
