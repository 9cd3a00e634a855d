//! Tests for the task retention sweep.

use std::sync::Arc;

use codevoice_api::background::task_retention::{
    sweep_once, RetentionPolicy, SweepReport, STALE_TASK_ERROR,
};
use codevoice_core::generation::{GenerationKind, GenerationRequest, TaskStatus};
use codevoice_db::store::{InMemoryTaskStore, TaskStore};
use codevoice_events::{InProcessBroker, Notifier, TaskBroker};
use tokio_util::sync::CancellationToken;

fn request() -> GenerationRequest {
    GenerationRequest::new(GenerationKind::Generate, "hello world app")
}

#[tokio::test]
async fn fresh_tasks_are_left_alone() {
    let store = InMemoryTaskStore::new();
    let queued = store.create(&request(), None).await.unwrap();
    let done = store.create(&request(), None).await.unwrap();
    store.claim_next().await.unwrap();
    store.claim_next().await.unwrap();
    store.fail(done.id, "boom").await.unwrap();

    let report = sweep_once(&store, &Notifier::disabled(), RetentionPolicy::new(24, 15))
        .await
        .unwrap();

    assert_eq!(report, SweepReport::default());
    assert_eq!(
        store.find(queued.id).await.unwrap().unwrap().status,
        TaskStatus::Running
    );
    assert!(store.find(done.id).await.unwrap().is_some());
}

#[tokio::test]
async fn stale_running_tasks_are_failed_and_announced() {
    let store = InMemoryTaskStore::new();
    let task = store.create(&request(), None).await.unwrap();
    store.claim_next().await.unwrap();

    let broker = Arc::new(InProcessBroker::default());
    let mut rx = broker.bus().subscribe();
    let notifier = Notifier::new(Some(broker as Arc<dyn TaskBroker>));

    // A zero-minute threshold makes every running task stale.
    let policy = RetentionPolicy {
        stale_after: chrono::Duration::zero(),
        ..RetentionPolicy::new(24, 15)
    };
    let report = sweep_once(&store, &notifier, policy).await.unwrap();

    assert_eq!(report.failed_stale, 1);
    let failed = store.find(task.id).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some(STALE_TASK_ERROR));

    let message = rx.recv().await.unwrap();
    let payload: serde_json::Value = serde_json::from_str(&message.payload).unwrap();
    assert_eq!(payload["status"], "failed");
    assert_eq!(payload["error"], STALE_TASK_ERROR);
}

#[tokio::test]
async fn expired_terminal_tasks_are_purged() {
    let store = InMemoryTaskStore::new();
    let done = store.create(&request(), None).await.unwrap();
    let pending = store.create(&request(), None).await.unwrap();
    store.claim_next().await.unwrap();
    store
        .complete(done.id, &serde_json::json!({ "code": "x" }))
        .await
        .unwrap();

    let policy = RetentionPolicy {
        retention: chrono::Duration::zero(),
        ..RetentionPolicy::new(24, 15)
    };
    let report = sweep_once(&store, &Notifier::disabled(), policy).await.unwrap();

    assert_eq!(report.purged, 1);
    assert!(store.find(done.id).await.unwrap().is_none());
    assert!(store.find(pending.id).await.unwrap().is_some());
}

#[tokio::test]
async fn run_stops_on_cancel() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(codevoice_api::background::task_retention::run(
        store,
        Notifier::disabled(),
        RetentionPolicy::new(24, 15),
        cancel.clone(),
    ));
    cancel.cancel();

    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("retention loop did not stop")
        .unwrap();
}
