//! The local JSON-blob gateway: persistence across reopen, filter
//! storage, and its use as the store's fallback backend.

use todosync::gateway::local::LocalGateway;
use todosync::{Filter, Patch, RemoteGateway, SyncConfig, TaskStore};

#[tokio::test]
async fn tasks_round_trip_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    {
        let gateway = LocalGateway::open(&path).await.unwrap();
        let created = gateway.create("persist me").await.unwrap();
        gateway
            .update(&created.id, Patch::completed(true))
            .await
            .unwrap();
    }

    let reopened = LocalGateway::open(&path).await.unwrap();
    let page = reopened.list(Filter::All, 1, 10).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].text, "persist me");
    assert!(page.items[0].completed);
}

#[tokio::test]
async fn filter_persists_with_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    {
        let gateway = LocalGateway::open(&path).await.unwrap();
        assert_eq!(gateway.load_filter().await, Filter::All);
        gateway.save_filter(Filter::Completed).await.unwrap();
    }

    let reopened = LocalGateway::open(&path).await.unwrap();
    assert_eq!(reopened.load_filter().await, Filter::Completed);
}

#[tokio::test]
async fn malformed_blob_starts_empty_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    tokio::fs::write(&path, b"{ not json").await.unwrap();

    let gateway = LocalGateway::open(&path).await.unwrap();
    let page = gateway.list(Filter::All, 1, 10).await.unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn missing_parent_directories_are_created_on_first_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deep").join("tasks.json");

    let gateway = LocalGateway::open(&path).await.unwrap();
    gateway.create("first").await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn store_runs_end_to_end_over_the_local_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        data_path: Some(dir.path().join("tasks.json")),
        ..SyncConfig::default()
    };

    {
        let store = TaskStore::with_local_fallback(config.clone()).await.unwrap();
        store.add("offline task").await.unwrap();
        store.toggle_all().await.unwrap();
    }

    // A fresh session reads the same blob back.
    let store = TaskStore::with_local_fallback(config).await.unwrap();
    store.refresh().await.unwrap();
    let tasks = store.all();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "offline task");
    assert!(tasks[0].completed);
}

#[tokio::test]
async fn clear_completed_and_bulk_update_hit_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = LocalGateway::open(dir.path().join("tasks.json"))
        .await
        .unwrap();

    let a = gateway.create("one").await.unwrap();
    let _b = gateway.create("two").await.unwrap();

    gateway
        .bulk_update(Patch::completed(true), Some(vec![a.id.clone()]))
        .await
        .unwrap();
    let page = gateway.list(Filter::Completed, 1, 10).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, a.id);

    gateway.clear_completed().await.unwrap();
    let page = gateway.list(Filter::All, 1, 10).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].text, "two");
}
