//! End-to-end scenarios against a full `TaskStore` over the in-memory
//! gateway: optimistic mutations, rollback, realtime reconciliation,
//! projection policies, and toast feedback.

use std::sync::Arc;
use std::time::Duration;

use todosync::gateway::memory::InMemoryGateway;
use todosync::{
    FeedbackEvent, Filter, GatewayError, PagePolicy, ProjectionError, RealtimeBus, RealtimeEvent,
    Severity, SyncConfig, SyncError, Task, TaskStore,
};

fn store_with(gateway: &InMemoryGateway, config: SyncConfig) -> TaskStore {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    TaskStore::new(Arc::new(gateway.clone()), config)
}

fn small_pages() -> SyncConfig {
    SyncConfig {
        page_size: 5,
        ..SyncConfig::default()
    }
}

async fn seeded(gateway: &InMemoryGateway, n: usize) -> TaskStore {
    gateway
        .seed(
            (0..n)
                .map(|i| Task::new(format!("id-{i}"), format!("task {i}"), false))
                .collect(),
        )
        .await;
    let store = store_with(gateway, small_pages());
    store.refresh().await.unwrap();
    store
}

#[tokio::test]
async fn add_then_list() {
    let gateway = InMemoryGateway::new();
    let store = store_with(&gateway, small_pages());

    store.add("buy milk").await.unwrap();

    let page = store.project(Filter::All, 1).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].text, "buy milk");
    assert!(!page.items[0].completed);

    let counts = store.counts();
    assert_eq!(counts.total, 1);
    assert_eq!(counts.active, 1);
    assert_eq!(counts.completed, 0);
}

#[tokio::test]
async fn delete_rollback_restores_the_exact_record() {
    let gateway = InMemoryGateway::new();
    gateway.seed(vec![Task::new("a", "x", false)]).await;
    let store = store_with(&gateway, small_pages());
    store.refresh().await.unwrap();

    gateway
        .fail_next(GatewayError::Transport("network unreachable".into()))
        .await;
    let err = store.delete("a").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));

    let tasks = store.all();
    assert_eq!(tasks, vec![Task::new("a", "x", false)]);
}

#[tokio::test]
async fn optimistic_delete_empties_the_cache_before_the_call_resolves() {
    let gateway = InMemoryGateway::new();
    gateway.seed(vec![Task::new("a", "x", false)]).await;
    let store = store_with(&gateway, small_pages());
    store.refresh().await.unwrap();

    gateway.pause();
    let store = Arc::new(store);
    let s = store.clone();
    let pending = tokio::spawn(async move { s.delete("a").await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(store.all().is_empty(), "delete must feel instant");

    gateway.resume();
    pending.await.unwrap().unwrap();
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn realtime_removal_during_pending_edit_leaves_the_task_absent() {
    let gateway = InMemoryGateway::new();
    gateway.seed(vec![Task::new("A", "old text", false)]).await;
    let store = Arc::new(store_with(&gateway, small_pages()));
    store.refresh().await.unwrap();

    let bus = RealtimeBus::new();
    store.attach_realtime(bus.subscribe());

    gateway.pause();
    let s = store.clone();
    let edit = tokio::spawn(async move { s.edit("A", "new text").await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    bus.emit(RealtimeEvent::TaskRemoved { id: "A".into() });
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Still present: the remove is queued behind the pending edit, not
    // applied mid-flight and not dropped.
    assert_eq!(store.all().len(), 1);

    gateway.resume();
    edit.await.unwrap().unwrap();

    // After both resolve, the remove event is the most recent writer.
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn pagination_clamps_after_a_shrinking_delete() {
    let gateway = InMemoryGateway::new();
    let store = seeded(&gateway, 6).await;

    // 6 items, page size 5: page 2 holds exactly one item.
    let page2 = store.project(Filter::All, 2).unwrap();
    assert_eq!(page2.items.len(), 1);
    let last_id = page2.items[0].id.clone();

    store.delete(&last_id).await.unwrap();

    // Page 2 no longer exists; the configured policy clamps to page 1.
    let page = store.project(Filter::All, 2).unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.total, 5);
}

#[tokio::test]
async fn strict_policy_reports_the_vanished_page() {
    let gateway = InMemoryGateway::new();
    gateway
        .seed(
            (0..6)
                .map(|i| Task::new(format!("id-{i}"), format!("task {i}"), false))
                .collect(),
        )
        .await;
    let store = store_with(
        &gateway,
        SyncConfig {
            page_size: 5,
            page_policy: PagePolicy::Strict,
            ..SyncConfig::default()
        },
    );
    store.refresh().await.unwrap();

    let last_id = store.project(Filter::All, 2).unwrap().items[0].id.clone();
    store.delete(&last_id).await.unwrap();

    assert_eq!(
        store.project(Filter::All, 2).unwrap_err(),
        ProjectionError::PageOutOfRange {
            requested: 2,
            last: 1
        }
    );
}

#[tokio::test]
async fn filtered_projection_follows_toggles() {
    let gateway = InMemoryGateway::new();
    let store = seeded(&gateway, 3).await;

    store.toggle("id-1").await.unwrap();

    let completed = store.project(Filter::Completed, 1).unwrap();
    assert_eq!(completed.items.len(), 1);
    assert_eq!(completed.items[0].id, "id-1");

    let active = store.project(Filter::Active, 1).unwrap();
    assert_eq!(active.items.len(), 2);

    let counts = store.counts();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.active, 2);
    assert_eq!(counts.completed, 1);
}

#[tokio::test]
async fn clear_completed_rolls_back_in_full_on_failure() {
    let gateway = InMemoryGateway::new();
    gateway
        .seed(vec![
            Task::new("a", "one", true),
            Task::new("b", "two", false),
            Task::new("c", "three", true),
        ])
        .await;
    let store = store_with(&gateway, small_pages());
    store.refresh().await.unwrap();
    let before = store.all();

    gateway
        .fail_next(GatewayError::Transport("network unreachable".into()))
        .await;
    store.clear_completed().await.unwrap_err();
    assert_eq!(store.all(), before);

    // And succeeds when the gateway is healthy again.
    store.clear_completed().await.unwrap();
    let remaining = store.all();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "b");
    assert_eq!(gateway.tasks().await.len(), 1);
}

#[tokio::test]
async fn not_found_rolls_back_and_realtime_converges() {
    let gateway = InMemoryGateway::new();
    gateway.seed(vec![Task::new("a", "one", false)]).await;
    let store = store_with(&gateway, small_pages());
    store.refresh().await.unwrap();

    let bus = RealtimeBus::new();
    store.attach_realtime(bus.subscribe());

    // Another client already deleted "a"; our toggle hits NotFound and
    // rolls the flag back.
    gateway.fail_next(GatewayError::NotFound("a".into())).await;
    let err = store.toggle("a").await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
    assert_eq!(store.all().len(), 1);
    assert!(!store.all()[0].completed);

    // The removed event then converges the cache to the correct state.
    bus.emit(RealtimeEvent::TaskRemoved { id: "a".into() });
    for _ in 0..100 {
        if store.all().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn mutation_toasts_carry_the_expected_severity() {
    let gateway = InMemoryGateway::new();
    let store = store_with(&gateway, small_pages());
    let mut toasts = store.toasts();

    store.add("buy milk").await.unwrap();
    match toasts.recv().await.unwrap() {
        FeedbackEvent::Shown { toast } => {
            assert_eq!(toast.severity, Severity::Success);
            assert_eq!(toast.text, "Task added");
        }
        other => panic!("expected Shown, got {other:?}"),
    }

    gateway
        .fail_next(GatewayError::Transport("network unreachable".into()))
        .await;
    let id = store.all()[0].id.clone();
    store.delete(&id).await.unwrap_err();

    // Skip the dismissal of the first toast if it arrives first.
    loop {
        match toasts.recv().await.unwrap() {
            FeedbackEvent::Shown { toast } => {
                assert_eq!(toast.severity, Severity::Error);
                assert!(toast.text.contains("network unreachable"));
                break;
            }
            FeedbackEvent::Dismissed { .. } => continue,
        }
    }
}

#[tokio::test]
async fn metrics_count_mutations_and_rollbacks() {
    let gateway = InMemoryGateway::new();
    let store = store_with(&gateway, small_pages());

    store.add("one").await.unwrap();
    store.add("two").await.unwrap();
    let id = store.all()[0].id.clone();
    store.toggle(&id).await.unwrap();

    gateway
        .fail_next(GatewayError::Transport("down".into()))
        .await;
    store.delete(&id).await.unwrap_err();

    let snap = store.metrics();
    assert_eq!(snap.adds, 2);
    assert_eq!(snap.updates, 1);
    assert_eq!(snap.deletes, 0);
    assert_eq!(snap.rollbacks, 1);
}

#[tokio::test]
async fn stats_and_csv_reflect_the_snapshot() {
    let gateway = InMemoryGateway::new();
    gateway
        .seed(vec![
            Task::new("a", "one", true),
            Task::new("b", "two", false),
        ])
        .await;
    let store = store_with(&gateway, small_pages());
    store.refresh().await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.completed, 1);

    let csv = store.export_csv().await.unwrap();
    assert!(csv.starts_with("id,text,completed"));
    assert!(csv.contains("a,\"one\",true"));
}

#[tokio::test]
async fn shutdown_stops_the_reconciler() {
    let gateway = InMemoryGateway::new();
    let store = store_with(&gateway, small_pages());
    let bus = RealtimeBus::new();
    store.attach_realtime(bus.subscribe());

    store.shutdown();

    bus.emit(RealtimeEvent::TaskCreated {
        task: Task::new("late", "too late", false),
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(store.all().is_empty());
}
