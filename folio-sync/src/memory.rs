//! In-process backing store.
//!
//! Holds collections in memory, pushes a full snapshot to every subscriber
//! after each write, and resolves server-timestamp placeholders with a
//! strictly increasing clock. Records of a collection are delivered in key
//! order.
//!
//! It doubles as the controllable channel for tests: it can go silent,
//! refuse subscriptions, reads or writes, inject asynchronous channel
//! errors, and hold one-shot reads until released.

use crate::channel::{BackingStore, ChannelEvent, Subscription, Unsubscribe};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use folio_types::{DocPath, Fields, RawRecord, Timestamp, is_server_timestamp};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

/// A write the store accepted, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Add { path: DocPath },
    Merge { path: DocPath, fields: Fields },
    Full { path: DocPath },
    Delete { path: DocPath },
}

struct Watcher<T> {
    id: u64,
    muted: bool,
    tx: mpsc::UnboundedSender<ChannelEvent<T>>,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    collection_watchers: HashMap<String, Vec<Watcher<Vec<RawRecord>>>>,
    document_watchers: HashMap<DocPath, Vec<Watcher<Option<Fields>>>>,
    next_watcher: u64,
    clock: Timestamp,
    writes: Vec<WriteRecord>,
    silent: bool,
    subscribe_failure: Option<String>,
    read_failure: Option<String>,
    write_failure: Option<String>,
}

impl MemoryState {
    fn record(&self, path: &DocPath) -> Option<&Fields> {
        self.collections.get(path.collection())?.get(path.id())
    }

    fn collection_snapshot(&self, collection: &str) -> Vec<RawRecord> {
        self.collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, fields)| RawRecord::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn stamp(&mut self, fields: &mut Fields) {
        for value in fields.values_mut() {
            if is_server_timestamp(value) {
                self.clock = self.clock.tick();
                *value = self.clock.to_wire();
            }
        }
    }

    fn check_writable(&self) -> SyncResult<()> {
        match &self.write_failure {
            Some(reason) => Err(SyncError::Channel(reason.clone())),
            None => Ok(()),
        }
    }

    /// Pushes the current state of `path` to its collection and document
    /// subscribers, pruning subscribers that went away.
    fn publish(&mut self, path: &DocPath) {
        let snapshot = self.collection_snapshot(path.collection());
        if let Some(watchers) = self.collection_watchers.get_mut(path.collection()) {
            watchers.retain(|w| {
                w.muted || w.tx.send(ChannelEvent::Snapshot(snapshot.clone())).is_ok()
            });
        }
        let record = self.record(path).cloned();
        if let Some(watchers) = self.document_watchers.get_mut(path) {
            watchers.retain(|w| {
                w.muted || w.tx.send(ChannelEvent::Snapshot(record.clone())).is_ok()
            });
        }
    }
}

/// An in-memory [`BackingStore`]. Clones share the same data.
#[derive(Clone)]
pub struct MemoryBackingStore {
    state: Arc<Mutex<MemoryState>>,
    reads_open: Arc<watch::Sender<bool>>,
}

impl Default for MemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (reads_open, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            reads_open: Arc::new(reads_open),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a record directly, bypassing failure injection, and notifies
    /// subscribers. Placeholders are resolved as for normal writes.
    pub fn seed(&self, collection: &str, id: &str, mut fields: Fields) {
        let path = DocPath::new(collection, id);
        let mut state = self.lock();
        state.stamp(&mut fields);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        state.publish(&path);
    }

    /// Loads `{ "<collection>": { "<id>": { ...fields } } }`.
    pub fn load_json(&self, seed: &Value) -> SyncResult<usize> {
        let collections = seed.as_object().ok_or_else(|| {
            SyncError::InvalidRecord("seed must be an object of collections".into())
        })?;
        let mut loaded = 0;
        for (collection, records) in collections {
            let records = records.as_object().ok_or_else(|| {
                let reason = format!("collection {collection} must be an object of records");
                SyncError::InvalidRecord(reason)
            })?;
            for (id, fields) in records {
                let fields = fields.as_object().cloned().ok_or_else(|| {
                    SyncError::InvalidRecord(format!("record {collection}/{id} must be an object"))
                })?;
                self.seed(collection, id, fields);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Reads a record without going through the channel.
    #[must_use]
    pub fn record(&self, path: &DocPath) -> Option<Fields> {
        self.lock().record(path).cloned()
    }

    /// Every accepted write so far.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Number of live subscriptions (collection and document).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let state = self.lock();
        state.collection_watchers.values().map(Vec::len).sum::<usize>()
            + state.document_watchers.values().map(Vec::len).sum::<usize>()
    }

    /// Subscriptions opened while silent never receive anything.
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    /// Makes new subscriptions fail synchronously.
    pub fn fail_subscriptions(&self, reason: Option<&str>) {
        self.lock().subscribe_failure = reason.map(str::to_string);
    }

    /// Makes one-shot reads fail.
    pub fn fail_reads(&self, reason: Option<&str>) {
        self.lock().read_failure = reason.map(str::to_string);
    }

    /// Makes writes fail.
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.lock().write_failure = reason.map(str::to_string);
    }

    /// Pushes a channel error to every subscriber of `collection`, and of
    /// any document inside it.
    pub fn emit_error(&self, collection: &str, reason: &str) {
        let mut state = self.lock();
        if let Some(watchers) = state.collection_watchers.get_mut(collection) {
            watchers.retain(|w| {
                w.muted || w.tx.send(ChannelEvent::Error(reason.to_string())).is_ok()
            });
        }
        for (path, watchers) in &mut state.document_watchers {
            if path.collection() == collection {
                watchers.retain(|w| {
                    w.muted || w.tx.send(ChannelEvent::Error(reason.to_string())).is_ok()
                });
            }
        }
    }

    /// Holds every one-shot read until [`Self::resume_reads`].
    pub fn pause_reads(&self) {
        self.reads_open.send_replace(false);
    }

    /// Releases held reads.
    pub fn resume_reads(&self) {
        self.reads_open.send_replace(true);
    }

    fn register<T>(
        &self,
        register: impl FnOnce(&mut MemoryState, Watcher<T>),
        remove: impl Fn(&mut MemoryState, u64) + Send + 'static,
        initial: impl FnOnce(&MemoryState) -> T,
    ) -> SyncResult<Subscription<T>> {
        let mut state = self.lock();
        if let Some(reason) = &state.subscribe_failure {
            return Err(SyncError::Channel(reason.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = state.next_watcher;
        state.next_watcher += 1;
        let muted = state.silent;
        if !muted {
            let _ = tx.send(ChannelEvent::Snapshot(initial(&*state)));
        }
        register(&mut *state, Watcher { id, muted, tx });

        let weak: Weak<Mutex<MemoryState>> = Arc::downgrade(&self.state);
        let unsubscribe = Unsubscribe::new(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                remove(&mut *state, id);
            }
        });
        Ok(Subscription::new(rx, unsubscribe))
    }
}

#[async_trait]
impl BackingStore for MemoryBackingStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn subscribe_collection(&self, collection: &str) -> SyncResult<Subscription<Vec<RawRecord>>> {
        let key = collection.to_string();
        let removal_key = key.clone();
        let subscription = self.register(
            |state, watcher| {
                state
                    .collection_watchers
                    .entry(key.clone())
                    .or_default()
                    .push(watcher);
            },
            move |state, id| {
                if let Some(watchers) = state.collection_watchers.get_mut(&removal_key) {
                    watchers.retain(|w| w.id != id);
                }
            },
            |state| state.collection_snapshot(collection),
        )?;
        debug!(collection, "memory store: collection subscribed");
        Ok(subscription)
    }

    fn subscribe_document(&self, path: &DocPath) -> SyncResult<Subscription<Option<Fields>>> {
        let key = path.clone();
        let removal_key = path.clone();
        let subscription = self.register(
            |state, watcher| state.document_watchers.entry(key).or_default().push(watcher),
            move |state, id| {
                if let Some(watchers) = state.document_watchers.get_mut(&removal_key) {
                    watchers.retain(|w| w.id != id);
                }
            },
            |state| state.record(path).cloned(),
        )?;
        debug!(document = %path, "memory store: document subscribed");
        Ok(subscription)
    }

    async fn get_once(&self, path: &DocPath) -> SyncResult<Option<Fields>> {
        let mut open = self.reads_open.subscribe();
        if open.wait_for(|open| *open).await.is_err() {
            return Err(SyncError::ChannelClosed);
        }
        let state = self.lock();
        if let Some(reason) = &state.read_failure {
            return Err(SyncError::Channel(reason.clone()));
        }
        Ok(state.record(path).cloned())
    }

    async fn add(&self, collection: &str, mut fields: Fields) -> SyncResult<String> {
        let id = Uuid::now_v7().simple().to_string();
        let path = DocPath::new(collection, id.as_str());
        let mut state = self.lock();
        state.check_writable()?;
        state.stamp(&mut fields);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        state.writes.push(WriteRecord::Add { path: path.clone() });
        state.publish(&path);
        Ok(id)
    }

    async fn write_merge(&self, path: &DocPath, mut fields: Fields) -> SyncResult<()> {
        let mut state = self.lock();
        state.check_writable()?;
        state.stamp(&mut fields);
        let record = state
            .collections
            .get_mut(path.collection())
            .and_then(|records| records.get_mut(path.id()))
            .ok_or_else(|| SyncError::NotFound(path.to_string()))?;
        record.extend(fields.clone());
        state.writes.push(WriteRecord::Merge {
            path: path.clone(),
            fields,
        });
        state.publish(path);
        Ok(())
    }

    async fn write_full(&self, path: &DocPath, mut fields: Fields) -> SyncResult<()> {
        let mut state = self.lock();
        state.check_writable()?;
        state.stamp(&mut fields);
        state
            .collections
            .entry(path.collection().to_string())
            .or_default()
            .insert(path.id().to_string(), fields);
        state.writes.push(WriteRecord::Full { path: path.clone() });
        state.publish(path);
        Ok(())
    }

    async fn delete_record(&self, path: &DocPath) -> SyncResult<()> {
        let mut state = self.lock();
        state.check_writable()?;
        if let Some(records) = state.collections.get_mut(path.collection()) {
            records.remove(path.id());
        }
        state.writes.push(WriteRecord::Delete { path: path.clone() });
        state.publish(path);
        Ok(())
    }
}
