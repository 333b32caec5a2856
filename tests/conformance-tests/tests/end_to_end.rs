//! Integration coverage wiring the real `queue-store-sqlite` and
//! `queue-sync` backends to `queue_core::Queue`, rather than the
//! in-process test doubles each crate's own unit tests use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use queue_core::test_support::ScriptedReplayDriver;
use queue_core::{
    BroadcastSyncTrigger, Entry, NullSyncTrigger, Queue, QueueError, QueueOptions, ReplayDriver,
    RequestRecord, Store, SyncTrigger,
};
use queue_store_sqlite::{DatabaseLocation, SqliteStore};
use queue_sync::PollingSyncTrigger;

fn entry(url: &str) -> Entry {
    Entry::new(RequestRecord::new("POST", url))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn durable_entries_survive_a_fresh_store_handle_at_the_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.sqlite");

    {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(DatabaseLocation::Path(path.clone())));
        let driver: Arc<dyn ReplayDriver> = Arc::new(ScriptedReplayDriver::always_succeeds());
        let sync: Arc<dyn SyncTrigger> = Arc::new(NullSyncTrigger);
        let queue = Queue::new("durable", store, driver, sync, QueueOptions::default())
            .await
            .unwrap();

        queue.push_request(entry("/first")).await.unwrap();
        queue.push_request(entry("/second")).await.unwrap();
        // Dropped here without ever calling replay_requests: simulates a
        // process crash between enqueue and replay.
    }

    // Queue names are never unregistered on drop (they are meant to live
    // for the process lifetime), so reusing "durable" here needs an
    // explicit reset rather than relying on the first queue going away.
    queue_core::registry::reset();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(DatabaseLocation::Path(path)));
    let driver = Arc::new(ScriptedReplayDriver::always_succeeds());
    let sync: Arc<dyn SyncTrigger> = Arc::new(NullSyncTrigger);
    let queue = Queue::new(
        "durable",
        store,
        driver.clone() as Arc<dyn ReplayDriver>,
        sync,
        QueueOptions::default(),
    )
    .await
    .unwrap();

    // `Queue::new` with no sync trigger subscription runs the cold-start
    // replay eagerly, so both entries should already have been replayed
    // in push order by the time construction returns.
    assert_eq!(driver.attempted_urls(), vec!["/first", "/second"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broadcast_sync_trigger_drives_replay_through_the_real_listener_task() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory());
    let driver = Arc::new(ScriptedReplayDriver::always_succeeds());
    let sync = Arc::new(BroadcastSyncTrigger::new());

    let queue = Queue::new(
        "broadcast",
        store.clone(),
        driver.clone() as Arc<dyn ReplayDriver>,
        sync.clone() as Arc<dyn SyncTrigger>,
        QueueOptions::default(),
    )
    .await
    .unwrap();

    queue.push_request(entry("/a")).await.unwrap();
    queue.push_request(entry("/b")).await.unwrap();

    // `push_request` already called `register_sync`, registering the
    // queue's tag with the trigger; firing it now drives the listener
    // task spawned inside `Queue::new`.
    sync.fire(queue.tag()).await.unwrap();

    // The listener task runs on its own spawned task; give it a moment.
    for _ in 0..100 {
        if driver.attempted_urls().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(driver.attempted_urls(), vec!["/a", "/b"]);
    assert!(store.get_all("broadcast").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn polling_sync_trigger_wakes_a_real_queue_on_reconnect() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory());
    let driver = Arc::new(ScriptedReplayDriver::always_succeeds());

    let online = Arc::new(AtomicBool::new(false));
    let probe_flag = online.clone();
    let sync = Arc::new(PollingSyncTrigger::new(
        move || probe_flag.load(Ordering::SeqCst),
        Duration::from_millis(10),
    ));

    let queue = Queue::new(
        "polling",
        store,
        driver.clone() as Arc<dyn ReplayDriver>,
        sync,
        QueueOptions::default(),
    )
    .await
    .unwrap();

    queue.push_request(entry("/offline-one")).await.unwrap();
    queue.push_request(entry("/offline-two")).await.unwrap();
    assert!(driver.attempted_urls().is_empty());

    online.store(true, Ordering::SeqCst);

    for _ in 0..200 {
        if driver.attempted_urls().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(driver.attempted_urls(), vec!["/offline-one", "/offline-two"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_named_queues_share_one_sqlite_store_without_crosstalk() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory());
    let driver_a = Arc::new(ScriptedReplayDriver::always_succeeds());
    let driver_b = Arc::new(ScriptedReplayDriver::always_succeeds());
    let sync: Arc<dyn SyncTrigger> = Arc::new(NullSyncTrigger);

    let a = Queue::new(
        "shared-a",
        store.clone(),
        driver_a.clone() as Arc<dyn ReplayDriver>,
        sync.clone(),
        QueueOptions::default(),
    )
    .await
    .unwrap();
    let b = Queue::new(
        "shared-b",
        store.clone(),
        driver_b.clone() as Arc<dyn ReplayDriver>,
        sync,
        QueueOptions::default(),
    )
    .await
    .unwrap();

    a.push_request(entry("/a1")).await.unwrap();
    b.push_request(entry("/b1")).await.unwrap();
    a.push_request(entry("/a2")).await.unwrap();

    a.replay_requests().await.unwrap();
    assert_eq!(driver_a.attempted_urls(), vec!["/a1", "/a2"]);
    assert_eq!(driver_b.attempted_urls(), Vec::<String>::new());

    b.replay_requests().await.unwrap();
    assert_eq!(driver_b.attempted_urls(), vec!["/b1"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replay_failure_against_a_real_store_leaves_entry_at_the_head() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory());
    let driver = Arc::new(ScriptedReplayDriver::new([true, false]));
    let sync: Arc<dyn SyncTrigger> = Arc::new(NullSyncTrigger);

    let queue = Queue::new(
        "retry",
        store.clone(),
        driver.clone() as Arc<dyn ReplayDriver>,
        sync,
        QueueOptions::default(),
    )
    .await
    .unwrap();

    queue.push_request(entry("/ok")).await.unwrap();
    queue.push_request(entry("/will-fail")).await.unwrap();
    queue.push_request(entry("/never-attempted")).await.unwrap();

    let err = queue.replay_requests().await.unwrap_err();
    assert!(matches!(err, QueueError::ReplayFailed(_)));

    let remaining = store.get_all("retry").await.unwrap();
    let urls: Vec<_> = remaining.iter().map(|e| e.request.url.clone()).collect();
    assert_eq!(urls, vec!["/will-fail", "/never-attempted"]);

    // A second replay attempt (e.g. the next sync event) resumes from
    // the re-enqueued head rather than skipping it. The scripted
    // driver's script is exhausted now, so every further call succeeds.
    queue.replay_requests().await.unwrap();
    assert_eq!(
        driver.attempted_urls(),
        vec!["/ok", "/will-fail", "/will-fail", "/never-attempted"]
    );
    assert!(store.get_all("retry").await.unwrap().is_empty());
}
