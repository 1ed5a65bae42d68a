//! The process-wide backing store handle, passed explicitly to every store
//! and resolver instead of living in a global.

use crate::channel::BackingStore;
use crate::error::{SyncError, SyncResult};
use std::fmt;
use std::sync::Arc;

/// What a store or resolver was given to talk to.
#[derive(Clone)]
pub enum Connection {
    /// A usable backing store.
    Ready(Arc<dyn BackingStore>),
    /// A backing store was configured but cannot be used. Stores fail closed
    /// with a configuration error.
    Misconfigured(String),
    /// No backing store at all. Stores stay empty without error.
    Unconfigured,
}

impl Connection {
    /// Wraps a backing store.
    pub fn ready(store: impl BackingStore + 'static) -> Self {
        Self::Ready(Arc::new(store))
    }

    /// Returns the store, or the reason there is none.
    pub fn store(&self) -> SyncResult<&Arc<dyn BackingStore>> {
        match self {
            Self::Ready(store) => Ok(store),
            Self::Misconfigured(reason) => Err(SyncError::Configuration(reason.clone())),
            Self::Unconfigured => Err(SyncError::NotConfigured),
        }
    }

    /// Whether a usable store is present.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(store) => write!(f, "Connection::Ready({})", store.backend_name()),
            Self::Misconfigured(reason) => write!(f, "Connection::Misconfigured({reason:?})"),
            Self::Unconfigured => write!(f, "Connection::Unconfigured"),
        }
    }
}
