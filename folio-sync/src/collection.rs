//! Live mirror of one remote collection.
//!
//! A store registers exactly one channel subscription, normalizes every
//! pushed snapshot into sorted [`Item`]s and swaps it in atomically.
//! Consumers never observe a half-applied event.
//!
//! Mutations are independent fire-and-forget writes; their effect shows up
//! when the backend pushes the next snapshot. None of them is transactional:
//!
//! - `insert` takes `order = current item count`, so two clients inserting
//!   at once can collide on `order` (the `createdAt` tie-break keeps the
//!   result deterministic);
//! - `reorder` swaps two order values with two separate writes issued
//!   concurrently. A reorder or delete landing between them can leave a
//!   duplicate or skipped value. This is accepted; strict ordering would
//!   need an atomic multi-record transform in the backend.

use crate::config::SyncConfig;
use crate::connection::Connection;
use crate::error::{StoreError, SyncResult};
use crate::live::{LiveHandle, LiveState};
use crate::order::{self, Direction, OrderOp, OrderPlan};
use folio_types::{DocPath, Fields, Item, RawRecord, RecordKind, SortPolicy, server_timestamp};
use futures::future::try_join_all;
use tokio::sync::watch;
use tracing::{debug, info};

/// Observable state of a [`SyncedCollectionStore`].
pub type CollectionState = LiveState<Vec<Item>>;

/// A wholesale view of the collection at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    /// Items in display order.
    pub items: Vec<Item>,
    /// Replacement counter; strictly increases with every new snapshot.
    pub generation: u64,
}

/// A subscription-backed, sorted mirror of one collection.
pub struct SyncedCollectionStore {
    collection: String,
    policy: SortPolicy,
    connection: Connection,
    live: LiveHandle<Vec<Item>>,
}

impl SyncedCollectionStore {
    /// Opens a store over `collection`. Must be called inside a Tokio
    /// runtime.
    pub fn open(
        connection: Connection,
        collection: impl Into<String>,
        policy: SortPolicy,
        config: &SyncConfig,
    ) -> Self {
        let collection = collection.into();
        let live = LiveHandle::open(
            &connection,
            collection.clone(),
            config,
            |store| store.subscribe_collection(&collection),
            move |records: Vec<RawRecord>| {
                let mut items: Vec<Item> = records.into_iter().map(Item::from_record).collect();
                order::sort_items(&mut items, policy);
                items
            },
        );
        Self {
            collection,
            policy,
            connection,
            live,
        }
    }

    /// Opens the store for a typed collection kind.
    pub fn open_kind<K: RecordKind>(connection: Connection, config: &SyncConfig) -> Self {
        Self::open(connection, K::COLLECTION, K::SORT, config)
    }

    /// The mirrored collection's name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The sort policy applied to every snapshot.
    #[must_use]
    pub fn policy(&self) -> SortPolicy {
        self.policy
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> CollectionState {
        self.live.state()
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CollectionSnapshot {
        self.live.read(|state| CollectionSnapshot {
            items: state.data.clone(),
            generation: state.generation,
        })
    }

    /// The current items converted to a record kind.
    #[must_use]
    pub fn items_as<K: RecordKind>(&self) -> Vec<K> {
        self.live.read(|state| state.data.iter().map(K::from_item).collect())
    }

    /// Finds an item in the current snapshot.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Item> {
        self.live
            .read(|state| state.data.iter().find(|item| item.id == id).cloned())
    }

    /// Whether the first verdict (event, error or timeout) is still pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.live.is_loading()
    }

    /// The current error, if any.
    #[must_use]
    pub fn error(&self) -> Option<StoreError> {
        self.live.error()
    }

    /// Watches state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CollectionState> {
        self.live.watch()
    }

    /// Waits until the store has left the loading state (or was closed).
    pub async fn loaded(&self) -> CollectionState {
        self.live.loaded().await
    }

    /// Creates a record with `order` set to the current item count and a
    /// server-assigned `createdAt`. Returns the backend key.
    pub async fn insert(&self, mut fields: Fields) -> SyncResult<String> {
        let store = self.connection.store()?;
        let order = self.live.read(|state| order::next_order(&state.data));
        fields.insert("order".into(), order.into());
        fields.insert("createdAt".into(), server_timestamp());

        let id = store.add(&self.collection, fields).await?;
        debug!(collection = %self.collection, %id, order, "inserted record");
        Ok(id)
    }

    /// Inserts a typed record.
    pub async fn insert_record<K: RecordKind>(&self, record: &K) -> SyncResult<String> {
        self.insert(record.to_fields()).await
    }

    /// Creates or replaces the record under a caller-chosen key. Concurrent
    /// writers to the same key are resolved by the backing store.
    pub async fn set(&self, id: &str, fields: Fields) -> SyncResult<()> {
        let store = self.connection.store()?;
        store.write_full(&self.path(id), fields).await?;
        debug!(collection = %self.collection, %id, "replaced record");
        Ok(())
    }

    /// Merges `partial` into the record `id`.
    pub async fn update(&self, id: &str, partial: Fields) -> SyncResult<()> {
        let store = self.connection.store()?;
        store.write_merge(&self.path(id), partial).await
    }

    /// Deletes the record `id`. Survivors keep their order values.
    pub async fn remove(&self, id: &str) -> SyncResult<()> {
        let store = self.connection.store()?;
        store.delete_record(&self.path(id)).await?;
        debug!(collection = %self.collection, %id, "removed record");
        Ok(())
    }

    /// Swaps the item at `index` with its neighbour in `direction`.
    ///
    /// A move past either end is a no-op. See the module docs for the race
    /// between the two writes.
    pub async fn reorder(&self, index: usize, direction: Direction) -> SyncResult<()> {
        let store = self.connection.store()?;
        let plan = self.live.read(|state| {
            order::reconcile(&state.data, &OrderOp::Move { index, direction })
        });
        let OrderPlan::Swap(assignments) = plan else {
            debug!(collection = %self.collection, index, ?direction, "reorder out of bounds");
            return Ok(());
        };

        let writes: Vec<(DocPath, Fields)> = assignments
            .iter()
            .map(|assignment| {
                let mut fields = Fields::new();
                fields.insert("order".into(), assignment.order.into());
                (self.path(&assignment.id), fields)
            })
            .collect();
        try_join_all(
            writes
                .iter()
                .map(|(path, fields)| store.write_merge(path, fields.clone())),
        )
        .await?;

        debug!(collection = %self.collection, index, ?direction, "reordered");
        Ok(())
    }

    /// Stops the subscription and the load timer. Idempotent; after it
    /// returns the state never changes again.
    pub fn close(&self) {
        if self.live.close() {
            info!(collection = %self.collection, "closed synced collection");
        }
    }

    fn path(&self, id: &str) -> DocPath {
        DocPath::new(self.collection.as_str(), id)
    }
}

impl Drop for SyncedCollectionStore {
    fn drop(&mut self) {
        self.close();
    }
}
