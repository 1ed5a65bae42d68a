//! Error types for the sync layer.

use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by mutations and backing-store calls.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No backing store was configured for this process.
    #[error("no backing store configured")]
    NotConfigured,

    /// The backing store is configured but unusable.
    #[error("backing store misconfigured: {0}")]
    Configuration(String),

    /// The channel rejected the request (permission denied, quota, ...).
    #[error("channel error: {0}")]
    Channel(String),

    /// The addressed record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record or request failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

/// The error a store exposes as part of its observable state.
///
/// Unlike [`SyncError`] this is cloneable and comparable, because every
/// state observer gets its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store is unreachable or misconfigured. Reported at open
    /// time, without waiting for the timeout.
    #[error("backing store misconfigured: {0}")]
    Configuration(String),

    /// No event arrived within the load window.
    #[error("backing store did not respond within {0:?}")]
    Timeout(Duration),

    /// The channel reported a failure.
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<SyncError> for StoreError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Configuration(reason) => Self::Configuration(reason),
            SyncError::Channel(reason) => Self::Channel(reason),
            other => Self::Channel(other.to_string()),
        }
    }
}
