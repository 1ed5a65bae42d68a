//! Addresses of single records inside the backing store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `collection/id` address of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    /// Creates a path from its two segments.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// The collection segment.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The record key segment.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocPath {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            [collection, id] if !collection.is_empty() && !id.is_empty() => {
                Ok(Self::new(*collection, *id))
            }
            _ => Err(crate::Error::InvalidPath(s.to_string())),
        }
    }
}
