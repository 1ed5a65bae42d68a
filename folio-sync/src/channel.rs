//! The remote collection channel contract.
//!
//! The backing store is a black box that pushes whole snapshots to
//! subscribers and accepts fire-and-forget writes. Stores in this crate only
//! consume the trait; [`crate::memory::MemoryBackingStore`] is the in-process
//! implementation used by the server and by tests.

use crate::error::SyncResult;
use async_trait::async_trait;
use folio_types::{DocPath, Fields, RawRecord};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// One push from a channel: either a full snapshot or a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent<T> {
    /// The complete current state of the subscribed target.
    Snapshot(T),
    /// The channel failed (permission denied, quota, ...).
    Error(String),
}

/// Events of a collection subscription.
pub type CollectionEvent = ChannelEvent<Vec<RawRecord>>;

/// Events of a single-document subscription; `None` means the document
/// does not exist.
pub type DocumentEvent = ChannelEvent<Option<Fields>>;

type CancelFn = Box<dyn FnOnce() + Send>;

/// Cancels a subscription. Cloneable; only the first call has an effect.
#[derive(Clone)]
pub struct Unsubscribe(Arc<Mutex<Option<CancelFn>>>);

impl Unsubscribe {
    /// Wraps the backend's cancel function.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Some(Box::new(cancel)))))
    }

    /// A handle with nothing to cancel.
    #[must_use]
    pub fn noop() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    /// Runs the cancel function if it has not run yet.
    pub fn call(&self) {
        let cancel = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether the cancel function has already run (or never existed).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("done", &self.is_done())
            .finish()
    }
}

/// A live subscription: the event queue plus its cancel handle.
///
/// Events are delivered one at a time, in order, to a single consumer.
#[derive(Debug)]
pub struct Subscription<T> {
    /// Pushed events.
    pub events: mpsc::UnboundedReceiver<ChannelEvent<T>>,
    /// Stops delivery.
    pub unsubscribe: Unsubscribe,
}

impl<T> Subscription<T> {
    /// Creates a subscription.
    pub fn new(events: mpsc::UnboundedReceiver<ChannelEvent<T>>, unsubscribe: Unsubscribe) -> Self {
        Self {
            events,
            unsubscribe,
        }
    }
}

/// A push-subscription document store.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Short provider name, for logs.
    fn backend_name(&self) -> &'static str;

    /// Subscribes to a whole collection. At least one initial event is
    /// expected from a healthy backend.
    fn subscribe_collection(&self, collection: &str) -> SyncResult<Subscription<Vec<RawRecord>>>;

    /// Subscribes to a single document.
    fn subscribe_document(&self, path: &DocPath) -> SyncResult<Subscription<Option<Fields>>>;

    /// One-shot read of a single document.
    async fn get_once(&self, path: &DocPath) -> SyncResult<Option<Fields>>;

    /// Creates a record under a backend-assigned key and returns the key.
    async fn add(&self, collection: &str, fields: Fields) -> SyncResult<String>;

    /// Merges `fields` into an existing record.
    async fn write_merge(&self, path: &DocPath, fields: Fields) -> SyncResult<()>;

    /// Replaces (or creates) a record.
    async fn write_full(&self, path: &DocPath, fields: Fields) -> SyncResult<()>;

    /// Deletes a record. Deleting a missing record is not an error.
    async fn delete_record(&self, path: &DocPath) -> SyncResult<()>;
}
