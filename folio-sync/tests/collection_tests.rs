//! Tests for the synced collection store: snapshot replacement, the load
//! timeout, failure handling, mutations and teardown.

mod common;

use common::{fields, record, scripted, wait_until};
use folio_sync::{
    Connection, Direction, MemoryBackingStore, StoreError, SyncConfig, SyncError,
    SyncedCollectionStore, UNORDERED, WriteRecord,
};
use folio_types::{
    DocPath, HelpfulLink, PortfolioEntry, RecordKind, SortPolicy, Timestamp, server_timestamp,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

fn ids(store: &SyncedCollectionStore) -> Vec<String> {
    store.snapshot().items.into_iter().map(|item| item.id).collect()
}

fn open_links(memory: &MemoryBackingStore) -> SyncedCollectionStore {
    SyncedCollectionStore::open_kind::<HelpfulLink>(
        Connection::ready(memory.clone()),
        &SyncConfig::default(),
    )
}

fn seed_link(memory: &MemoryBackingStore, id: &str, order: i64) {
    memory.seed(
        "helpfulLinks",
        id,
        fields(json!({ "title": id, "url": format!("https://{id}.dev"), "order": order })),
    );
}

// ── Snapshots ────────────────────────────────────────────────────

#[tokio::test]
async fn starts_loading_then_settles_on_first_snapshot() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );
    assert!(links.is_loading());
    assert_eq!(links.snapshot().generation, 0);

    script.snapshot(vec![record("a", json!({ "order": 0 }))]);
    let state = links.loaded().await;
    assert!(!state.is_loading);
    assert_eq!(state.generation, 1);
    assert_eq!(state.error, None);
    assert_eq!(state.data.len(), 1);
}

#[tokio::test]
async fn snapshots_replace_rather_than_accumulate() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );
    let mut rx = links.watch();

    script.snapshot(vec![
        record("a", json!({ "order": 0 })),
        record("b", json!({ "order": 1 })),
    ]);
    wait_until(&mut rx, |s| s.generation == 1).await;
    assert_eq!(ids(&links), vec!["a", "b"]);

    script.snapshot(vec![record("c", json!({ "order": 0 }))]);
    let state = wait_until(&mut rx, |s| s.generation == 2).await;
    assert_eq!(state.data.len(), 1);
    assert_eq!(ids(&links), vec!["c"]);
}

#[tokio::test]
async fn generation_increases_with_every_event() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );
    let mut rx = links.watch();

    for expected in 1..=4u64 {
        script.snapshot(vec![]);
        let state = wait_until(&mut rx, |s| s.generation >= expected).await;
        assert_eq!(state.generation, expected);
    }
}

#[tokio::test]
async fn snapshot_is_sorted_with_unordered_items_last_in_arrival_order() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );

    script.snapshot(vec![
        record("late", json!({ "createdAt": 100 })),
        record("later", json!({ "createdAt": 500 })),
        record("second", json!({ "order": 2 })),
        record("tie-old", json!({ "order": 1, "createdAt": 10 })),
        record("tie-new", json!({ "order": 1, "createdAt": 20 })),
    ]);
    links.loaded().await;

    assert_eq!(ids(&links), vec!["tie-new", "tie-old", "second", "late", "later"]);
    let links = links.items_as::<HelpfulLink>();
    assert_eq!(links[3].order, None);
}

#[tokio::test]
async fn newest_first_ignores_order() {
    let memory = MemoryBackingStore::new();
    memory.seed("portfolio", "old", fields(json!({ "createdAt": 1_000, "order": 0 })));
    memory.seed("portfolio", "new", fields(json!({ "createdAt": 9_000, "order": 5 })));
    memory.seed("portfolio", "undated", fields(json!({ "title": "x" })));

    let portfolio = SyncedCollectionStore::open_kind::<PortfolioEntry>(
        Connection::ready(memory),
        &SyncConfig::default(),
    );
    portfolio.loaded().await;

    assert_eq!(portfolio.policy(), PortfolioEntry::SORT);
    assert_eq!(ids(&portfolio), vec!["new", "old", "undated"]);
}

#[test]
fn unordered_sentinel_sorts_last() {
    assert_eq!(UNORDERED, 9999);
}

// ── Load timeout ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn silent_channel_times_out_exactly_once() {
    let memory = MemoryBackingStore::new();
    memory.set_silent(true);
    let links = open_links(&memory);

    let started = Instant::now();
    let state = links.loaded().await;
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(state.error, Some(StoreError::Timeout(Duration::from_secs(10))));
    assert_eq!(state.generation, 1);
    assert!(state.data.is_empty());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(links.snapshot().generation, 1);
}

#[tokio::test(start_paused = true)]
async fn custom_load_timeout_is_honoured() {
    let memory = MemoryBackingStore::new();
    memory.set_silent(true);
    let config = SyncConfig::with_load_timeout(Duration::from_millis(250));
    let links = SyncedCollectionStore::open_kind::<HelpfulLink>(Connection::ready(memory), &config);

    let state = links.loaded().await;
    assert_eq!(state.error, Some(StoreError::Timeout(Duration::from_millis(250))));
}

#[tokio::test(start_paused = true)]
async fn early_event_cancels_the_timer() {
    let memory = MemoryBackingStore::new();
    seed_link(&memory, "a", 0);
    let links = open_links(&memory);

    let state = links.loaded().await;
    assert_eq!(state.error, None);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let state = links.state();
    assert_eq!(state.error, None);
    assert_eq!(state.generation, 1);
    assert_eq!(state.data.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn early_error_also_cancels_the_timer() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );

    script.error("permission denied");
    let state = links.loaded().await;
    assert_eq!(state.error, Some(StoreError::Channel("permission denied".into())));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(links.snapshot().generation, 1);
    assert_eq!(links.error(), Some(StoreError::Channel("permission denied".into())));
}

#[tokio::test(start_paused = true)]
async fn channel_ending_without_events_still_times_out() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );
    drop(script);

    let started = Instant::now();
    let state = links.loaded().await;
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(state.error, Some(StoreError::Timeout(Duration::from_secs(10))));
}

#[tokio::test(start_paused = true)]
async fn late_snapshot_after_timeout_recovers() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );
    let mut rx = links.watch();

    let state = links.loaded().await;
    assert!(matches!(state.error, Some(StoreError::Timeout(_))));

    script.snapshot(vec![record("a", json!({}))]);
    let state = wait_until(&mut rx, |s| s.generation == 2).await;
    assert_eq!(state.error, None);
    assert_eq!(state.data.len(), 1);
}

// ── Failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn channel_error_empties_the_snapshot() {
    let memory = MemoryBackingStore::new();
    seed_link(&memory, "a", 0);
    seed_link(&memory, "b", 1);
    let links = open_links(&memory);
    let mut rx = links.watch();
    links.loaded().await;
    assert_eq!(links.snapshot().items.len(), 2);

    memory.emit_error("helpfulLinks", "quota exceeded");
    let state = wait_until(&mut rx, |s| s.generation == 2).await;
    assert!(state.data.is_empty());
    assert!(!state.is_loading);
    assert_eq!(state.error, Some(StoreError::Channel("quota exceeded".into())));
}

#[tokio::test]
async fn snapshot_after_error_clears_it() {
    let (store, script) = scripted();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );
    let mut rx = links.watch();

    script.error("unavailable");
    wait_until(&mut rx, |s| s.generation == 1).await;
    script.snapshot(vec![record("a", json!({ "order": 0 }))]);
    let state = wait_until(&mut rx, |s| s.generation == 2).await;

    assert_eq!(state.error, None);
    assert_eq!(state.data.len(), 1);
}

#[tokio::test]
async fn misconfigured_fails_immediately() {
    let links = SyncedCollectionStore::open_kind::<HelpfulLink>(
        Connection::Misconfigured("missing project id".into()),
        &SyncConfig::default(),
    );

    let state = links.state();
    assert!(!state.is_loading);
    assert!(state.data.is_empty());
    assert_eq!(
        state.error,
        Some(StoreError::Configuration("missing project id".into()))
    );

    let err = links.insert_record(&HelpfulLink::new("a", "b", "")).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
}

#[tokio::test]
async fn unconfigured_stays_empty_without_error() {
    let links = SyncedCollectionStore::open_kind::<HelpfulLink>(
        Connection::Unconfigured,
        &SyncConfig::default(),
    );

    let state = links.loaded().await;
    assert!(!state.is_loading);
    assert!(state.data.is_empty());
    assert_eq!(state.error, None);

    assert!(matches!(links.remove("x").await, Err(SyncError::NotConfigured)));
    assert!(matches!(
        links.reorder(0, Direction::Down).await,
        Err(SyncError::NotConfigured)
    ));
}

#[tokio::test]
async fn refused_subscription_is_reported_as_channel_error() {
    let memory = MemoryBackingStore::new();
    memory.fail_subscriptions(Some("permission denied"));
    let links = open_links(&memory);

    let state = links.state();
    assert!(!state.is_loading);
    assert_eq!(state.error, Some(StoreError::Channel("permission denied".into())));
    assert_eq!(memory.subscriber_count(), 0);
}

// ── Mutations ────────────────────────────────────────────────────

#[tokio::test]
async fn insert_appends_with_count_as_order() {
    let memory = MemoryBackingStore::new();
    let links = open_links(&memory);
    let mut rx = links.watch();
    links.loaded().await;

    for (n, title) in ["first", "second", "third"].into_iter().enumerate() {
        links
            .insert_record(&HelpfulLink::new(title, "https://x.dev", ""))
            .await
            .unwrap();
        wait_until(&mut rx, |s| s.data.len() == n + 1).await;
    }

    let links = links.items_as::<HelpfulLink>();
    let titles: Vec<_> = links.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
    let orders: Vec<_> = links.iter().map(|l| l.order).collect();
    assert_eq!(orders, vec![Some(0), Some(1), Some(2)]);
    assert!(links.iter().all(|l| l.created_at.is_some()));
}

#[tokio::test]
async fn insert_stamps_created_at_on_the_server() {
    let memory = MemoryBackingStore::new();
    let links = open_links(&memory);
    links.loaded().await;

    let id = links
        .insert(fields(json!({ "title": "t", "createdAt": 1 })))
        .await
        .unwrap();
    let stored = memory.record(&DocPath::new("helpfulLinks", id.as_str())).unwrap();
    let created = Timestamp::from_wire(&stored["createdAt"]).unwrap();
    assert!(created > Timestamp::from_millis(1));
    assert_ne!(stored["createdAt"], server_timestamp());
}

#[tokio::test]
async fn update_merges_fields() {
    let memory = MemoryBackingStore::new();
    seed_link(&memory, "a", 0);
    let links = open_links(&memory);
    let mut rx = links.watch();
    links.loaded().await;

    links
        .update("a", fields(json!({ "title": "renamed" })))
        .await
        .unwrap();
    wait_until(&mut rx, |s| s.generation == 2).await;

    let item = links.get("a").unwrap();
    assert_eq!(item.str_field("title"), "renamed");
    assert_eq!(item.str_field("url"), "https://a.dev");
    assert_eq!(item.order, Some(0));
}

#[tokio::test]
async fn update_missing_record_is_not_found() {
    let memory = MemoryBackingStore::new();
    let links = open_links(&memory);
    links.loaded().await;

    let err = links.update("ghost", fields(json!({ "title": "x" }))).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn remove_leaves_survivor_orders_untouched() {
    let memory = MemoryBackingStore::new();
    seed_link(&memory, "a", 0);
    seed_link(&memory, "b", 1);
    seed_link(&memory, "c", 2);
    let links = open_links(&memory);
    let mut rx = links.watch();
    links.loaded().await;

    links.remove("b").await.unwrap();
    wait_until(&mut rx, |s| s.data.len() == 2).await;

    let orders: Vec<_> = links.snapshot().items.iter().map(|i| (i.id.clone(), i.order)).collect();
    assert_eq!(orders, vec![("a".to_string(), Some(0)), ("c".to_string(), Some(2))]);
    assert_eq!(
        memory.writes(),
        vec![WriteRecord::Delete {
            path: DocPath::new("helpfulLinks", "b")
        }]
    );
}

#[tokio::test]
async fn reorder_swaps_neighbour_orders() {
    let memory = MemoryBackingStore::new();
    seed_link(&memory, "a", 0);
    seed_link(&memory, "b", 1);
    seed_link(&memory, "c", 2);
    let links = open_links(&memory);
    let mut rx = links.watch();
    links.loaded().await;

    links.reorder(0, Direction::Down).await.unwrap();
    wait_until(&mut rx, |s| s.data.first().map(|i| i.id.as_str()) == Some("b")).await;

    assert_eq!(ids(&links), vec!["b", "a", "c"]);
    assert_eq!(
        memory.writes(),
        vec![
            WriteRecord::Merge {
                path: DocPath::new("helpfulLinks", "a"),
                fields: fields(json!({ "order": 1 })),
            },
            WriteRecord::Merge {
                path: DocPath::new("helpfulLinks", "b"),
                fields: fields(json!({ "order": 0 })),
            },
        ]
    );
}

#[tokio::test]
async fn reorder_past_either_end_is_a_no_op() {
    let memory = MemoryBackingStore::new();
    seed_link(&memory, "a", 0);
    seed_link(&memory, "b", 1);
    let links = open_links(&memory);
    links.loaded().await;

    links.reorder(0, Direction::Up).await.unwrap();
    links.reorder(1, Direction::Down).await.unwrap();
    links.reorder(7, Direction::Up).await.unwrap();

    assert!(memory.writes().is_empty());
    assert_eq!(ids(&links), vec!["a", "b"]);
}

#[tokio::test]
async fn reorder_of_unordered_items_uses_positions() {
    let memory = MemoryBackingStore::new();
    memory.seed("helpfulLinks", "a", fields(json!({ "title": "a" })));
    memory.seed("helpfulLinks", "b", fields(json!({ "title": "b" })));
    let links = open_links(&memory);
    let mut rx = links.watch();
    links.loaded().await;

    links.reorder(1, Direction::Up).await.unwrap();
    wait_until(&mut rx, |s| s.data.iter().all(|i| i.order.is_some())).await;

    assert_eq!(ids(&links), vec!["b", "a"]);
}

#[tokio::test]
async fn failed_write_is_returned_to_caller() {
    let memory = MemoryBackingStore::new();
    seed_link(&memory, "a", 0);
    seed_link(&memory, "b", 1);
    let links = open_links(&memory);
    links.loaded().await;

    memory.fail_writes(Some("read-only"));
    let err = links.reorder(0, Direction::Down).await.unwrap_err();
    assert!(matches!(err, SyncError::Channel(ref reason) if reason == "read-only"));
    assert_eq!(links.snapshot().generation, 1);
}

// ── Teardown ─────────────────────────────────────────────────────

#[tokio::test]
async fn close_is_idempotent_and_releases_the_subscription() {
    let memory = MemoryBackingStore::new();
    let links = open_links(&memory);
    links.loaded().await;
    assert_eq!(memory.subscriber_count(), 1);

    links.close();
    links.close();
    assert_eq!(memory.subscriber_count(), 0);
    assert!(links.state().closed);
}

#[tokio::test]
async fn no_update_lands_after_close() {
    let (store, script) = scripted();
    let unsubscribed = store.unsubscribed.clone();
    let links = SyncedCollectionStore::open(
        Connection::ready(store),
        "helpfulLinks",
        SortPolicy::Manual,
        &SyncConfig::default(),
    );
    script.snapshot(vec![record("a", json!({}))]);
    links.loaded().await;

    links.close();
    assert!(unsubscribed.load(Ordering::SeqCst));

    script.snapshot(vec![]);
    script.error("late");
    tokio::task::yield_now().await;

    let state = links.state();
    assert_eq!(state.generation, 1);
    assert_eq!(state.data.len(), 1);
    assert_eq!(state.error, None);
}

#[tokio::test(start_paused = true)]
async fn close_while_loading_cancels_the_timer() {
    let memory = MemoryBackingStore::new();
    memory.set_silent(true);
    let links = open_links(&memory);

    links.close();
    let state = links.loaded().await;
    assert!(state.closed);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let state = links.state();
    assert!(state.is_loading);
    assert_eq!(state.error, None);
    assert_eq!(state.generation, 0);
}

#[tokio::test]
async fn drop_releases_the_subscription() {
    let memory = MemoryBackingStore::new();
    {
        let _links = open_links(&memory);
        assert_eq!(memory.subscriber_count(), 1);
    }
    assert_eq!(memory.subscriber_count(), 0);
}
