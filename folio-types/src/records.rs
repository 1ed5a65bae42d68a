//! Typed views over the collections the site keeps.
//!
//! Each collection kind declares its backend name, how its snapshot is
//! sorted, and a total conversion from a normalized [`Item`]. Conversions
//! never fail: a missing or mistyped field becomes its empty default.

use crate::{Fields, Item, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a collection snapshot is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortPolicy {
    /// User-controlled `order` field first, then newest first; items without
    /// an order go last in arrival sequence.
    Manual,
    /// Newest `createdAt` first; `order` is ignored.
    NewestFirst,
}

/// A collection whose records have a known shape.
pub trait RecordKind: Sized {
    /// Backend collection name.
    const COLLECTION: &'static str;
    /// Snapshot ordering for this collection.
    const SORT: SortPolicy;

    /// Total conversion from a normalized item.
    fn from_item(item: &Item) -> Self;

    /// Fields written when the record is created. Store-managed fields
    /// (`order`, `createdAt`) are not included.
    fn to_fields(&self) -> Fields;
}

/// A curated link shown on the tools page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpfulLink {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub order: Option<i64>,
    pub created_at: Option<Timestamp>,
}

impl HelpfulLink {
    /// Creates a new, not yet stored link. Inputs are trimmed.
    pub fn new(title: &str, url: &str, description: &str) -> Self {
        Self {
            id: String::new(),
            title: title.trim().to_string(),
            url: url.trim().to_string(),
            description: description.trim().to_string(),
            order: None,
            created_at: None,
        }
    }
}

impl RecordKind for HelpfulLink {
    const COLLECTION: &'static str = "helpfulLinks";
    const SORT: SortPolicy = SortPolicy::Manual;

    fn from_item(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            title: item.str_field("title").to_string(),
            url: item.str_field("url").to_string(),
            description: item.str_field("description").to_string(),
            order: item.order,
            created_at: item.created_at,
        }
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), self.title.trim().into());
        fields.insert("url".into(), self.url.trim().into());
        fields.insert("description".into(), self.description.trim().into());
        fields
    }
}

/// Partial update for a [`HelpfulLink`]; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpfulLinkPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl HelpfulLinkPatch {
    /// Trimmed partial field map.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        for (key, value) in [
            ("title", &self.title),
            ("url", &self.url),
            ("description", &self.description),
        ] {
            if let Some(value) = value {
                fields.insert(key.into(), value.trim().into());
            }
        }
        fields
    }
}

/// A portfolio project card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub image: String,
    pub created_at: Option<Timestamp>,
}

impl PortfolioEntry {
    /// Creates a new, not yet stored entry.
    pub fn new(title: &str, url: &str) -> Self {
        Self {
            id: String::new(),
            title: title.to_string(),
            url: url.to_string(),
            description: String::new(),
            tags: Vec::new(),
            image: String::new(),
            created_at: None,
        }
    }
}

impl RecordKind for PortfolioEntry {
    const COLLECTION: &'static str = "portfolio";
    const SORT: SortPolicy = SortPolicy::NewestFirst;

    fn from_item(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            title: item.str_field("title").to_string(),
            url: item.str_field("url").to_string(),
            description: item.str_field("description").to_string(),
            tags: item.field("tags").map(parse_tags).unwrap_or_default(),
            image: item.str_field("image").to_string(),
            created_at: item.created_at,
        }
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), self.title.clone().into());
        fields.insert("url".into(), self.url.clone().into());
        fields.insert("description".into(), self.description.trim().into());
        fields.insert("tags".into(), self.tags.clone().into());
        fields.insert("image".into(), self.image.trim().into());
        fields
    }
}

/// Partial update for a [`PortfolioEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    /// Either an array of strings or a comma-separated string.
    pub tags: Option<Value>,
    pub image: Option<String>,
}

impl PortfolioPatch {
    /// Partial field map; tags are normalized to an array.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        for (key, value) in [
            ("title", &self.title),
            ("url", &self.url),
            ("description", &self.description),
            ("image", &self.image),
        ] {
            if let Some(value) = value {
                fields.insert(key.into(), value.clone().into());
            }
        }
        if let Some(tags) = &self.tags {
            fields.insert("tags".into(), parse_tags(tags).into());
        }
        fields
    }
}

/// Accepts a string array or a comma-separated string; trims each tag and
/// drops empties. Anything else is no tags.
#[must_use]
pub fn parse_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// A short link: `/{slug}` forwards to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEntry {
    /// Also the record key.
    pub slug: String,
    pub url: String,
    pub created_at: Option<Timestamp>,
}

impl RecordKind for RedirectEntry {
    const COLLECTION: &'static str = "redirects";
    const SORT: SortPolicy = SortPolicy::NewestFirst;

    fn from_item(item: &Item) -> Self {
        Self {
            slug: item.id.clone(),
            url: item.str_field("url").to_string(),
            created_at: item.created_at,
        }
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("url".into(), self.url.trim().into());
        fields
    }
}
