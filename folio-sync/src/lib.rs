//! Live synchronization and ordering layer for Folio.
//!
//! Mirrors remote collections into local, always-consistent snapshots and
//! keeps a user-controlled total order over their items without any
//! server-side transaction support.
//!
//! # Architecture
//!
//! ```text
//! BackingStore (push channel)
//!        │ snapshot / error events
//!        ▼
//! SyncedCollectionStore ── normalize + sort ──► watch::Receiver<state>
//! SyncedDocumentStore   ── normalize ─────────► watch::Receiver<state>
//!        │ insert / update / remove / reorder
//!        ▼
//! OrderReconciler ──► writes back through the BackingStore
//! ```
//!
//! ## Components
//!
//! - **Channel**: the push-subscription contract the backend fulfils
//! - **Connection**: the explicitly injected backend handle
//! - **Order**: deterministic sort policy and reorder planning
//! - **Collection / Document**: the two store kinds, sharing one
//!   loading → loaded/error/timeout state machine
//! - **Memory**: an in-process backend, also used as the fake channel in tests
//!
//! # Example
//!
//! ```
//! use folio_sync::{Connection, MemoryBackingStore, SyncConfig, SyncedCollectionStore};
//! use folio_types::HelpfulLink;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let connection = Connection::ready(MemoryBackingStore::new());
//! let links = SyncedCollectionStore::open_kind::<HelpfulLink>(connection, &SyncConfig::default());
//!
//! let state = links.loaded().await;
//! assert!(state.data.is_empty());
//! links.close();
//! # }
//! ```

pub mod channel;
mod collection;
mod config;
mod connection;
mod document;
mod error;
mod live;
pub mod memory;
pub mod order;

pub use channel::{
    BackingStore, ChannelEvent, CollectionEvent, DocumentEvent, Subscription, Unsubscribe,
};
pub use collection::{CollectionSnapshot, CollectionState, SyncedCollectionStore};
pub use config::{DEFAULT_LOAD_TIMEOUT, SyncConfig};
pub use connection::Connection;
pub use document::{
    About, DocumentState, HOME_CONTENT_COLLECTION, HOME_CONTENT_ID, Hero, HomeContent, SubItem,
    SubList, SyncedDocumentStore, home_content_path, sort_by_date_desc,
};
pub use error::{StoreError, SyncError, SyncResult};
pub use live::LiveState;
pub use memory::{MemoryBackingStore, WriteRecord};
pub use order::{Direction, OrderAssignment, OrderOp, OrderPlan, UNORDERED};
