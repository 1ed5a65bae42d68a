//! Core type definitions for Folio.
//!
//! This crate defines the record shapes shared by the sync layer and the
//! routing layer:
//! - Items as mirrored from a remote collection (id, fields, order, createdAt)
//! - Wire timestamp normalization (millis, `{seconds, nanoseconds}`, RFC 3339)
//! - Document paths (`collection/id`)
//! - Typed record kinds for each collection the site uses
//!
//! Nothing here performs I/O.

mod item;
mod path;
mod records;
mod timestamp;

pub use item::{Fields, Item, RawRecord};
pub use path::DocPath;
pub use records::{
    HelpfulLink, HelpfulLinkPatch, PortfolioEntry, PortfolioPatch, RecordKind, RedirectEntry,
    SortPolicy, parse_tags,
};
pub use timestamp::{SERVER_TIMESTAMP_KEY, Timestamp, is_server_timestamp, server_timestamp};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
