//! Shared fixtures for folio-sync integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use folio_sync::{
    BackingStore, ChannelEvent, CollectionEvent, DocumentEvent, Subscription, SyncError,
    SyncResult, Unsubscribe,
};
use folio_types::{DocPath, Fields, RawRecord};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// A backing store whose channel is driven by hand.
///
/// The test keeps the sending half and pushes events one by one. Writes are
/// refused; use `MemoryBackingStore` for mutation tests.
pub struct ScriptedStore {
    collection: Mutex<Option<mpsc::UnboundedReceiver<CollectionEvent>>>,
    document: Mutex<Option<mpsc::UnboundedReceiver<DocumentEvent>>>,
    pub unsubscribed: Arc<AtomicBool>,
}

pub struct Script {
    pub collection: mpsc::UnboundedSender<CollectionEvent>,
    pub document: mpsc::UnboundedSender<DocumentEvent>,
}

impl Script {
    pub fn snapshot(&self, records: Vec<RawRecord>) {
        let _ = self.collection.send(ChannelEvent::Snapshot(records));
    }

    pub fn error(&self, reason: &str) {
        let _ = self.collection.send(ChannelEvent::Error(reason.to_string()));
    }

    pub fn document(&self, fields: Option<Fields>) {
        let _ = self.document.send(ChannelEvent::Snapshot(fields));
    }
}

pub fn scripted() -> (ScriptedStore, Script) {
    let (ctx, crx) = mpsc::unbounded_channel();
    let (dtx, drx) = mpsc::unbounded_channel();
    let store = ScriptedStore {
        collection: Mutex::new(Some(crx)),
        document: Mutex::new(Some(drx)),
        unsubscribed: Arc::new(AtomicBool::new(false)),
    };
    (
        store,
        Script {
            collection: ctx,
            document: dtx,
        },
    )
}

impl ScriptedStore {
    fn cancel(&self) -> Unsubscribe {
        let flag = self.unsubscribed.clone();
        Unsubscribe::new(move || flag.store(true, Ordering::SeqCst))
    }
}

#[async_trait]
impl BackingStore for ScriptedStore {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    fn subscribe_collection(&self, _collection: &str) -> SyncResult<Subscription<Vec<RawRecord>>> {
        let rx = self.collection.lock().unwrap().take().ok_or(SyncError::ChannelClosed)?;
        Ok(Subscription::new(rx, self.cancel()))
    }

    fn subscribe_document(&self, _path: &DocPath) -> SyncResult<Subscription<Option<Fields>>> {
        let rx = self.document.lock().unwrap().take().ok_or(SyncError::ChannelClosed)?;
        Ok(Subscription::new(rx, self.cancel()))
    }

    async fn get_once(&self, _path: &DocPath) -> SyncResult<Option<Fields>> {
        Err(SyncError::ChannelClosed)
    }

    async fn add(&self, _collection: &str, _fields: Fields) -> SyncResult<String> {
        Err(SyncError::ChannelClosed)
    }

    async fn write_merge(&self, _path: &DocPath, _fields: Fields) -> SyncResult<()> {
        Err(SyncError::ChannelClosed)
    }

    async fn write_full(&self, _path: &DocPath, _fields: Fields) -> SyncResult<()> {
        Err(SyncError::ChannelClosed)
    }

    async fn delete_record(&self, _path: &DocPath) -> SyncResult<()> {
        Err(SyncError::ChannelClosed)
    }
}

pub fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

pub fn record(id: &str, value: Value) -> RawRecord {
    RawRecord::new(id, fields(value))
}

/// Waits until the watched state satisfies `f`.
pub async fn wait_until<T: Clone>(rx: &mut watch::Receiver<T>, f: impl FnMut(&T) -> bool) -> T {
    rx.wait_for(f).await.unwrap().clone()
}
