//! Live mirror of the home-page aggregate document.
//!
//! The aggregate holds scalar sections (hero, about) and several named
//! sub-lists. Sub-list entries carry locally generated ids because the
//! whole list is rewritten on every mutation.
//!
//! Every mutation is read-modify-write against the locally cached snapshot,
//! not a server-side transform. Two sessions mutating the same list at
//! nearly the same time can lose one change: the last writer wins on the
//! whole list.
//!
//! The document is created lazily. The first mutation against a missing
//! document writes the full default shape before applying itself, which
//! costs an extra round trip.

use crate::config::SyncConfig;
use crate::connection::Connection;
use crate::error::{StoreError, SyncError, SyncResult};
use crate::live::{LiveHandle, LiveState};
use chrono::{DateTime, NaiveDate};
use folio_types::{DocPath, Fields, server_timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Collection holding the aggregate.
pub const HOME_CONTENT_COLLECTION: &str = "homeContent";
/// Key of the aggregate record.
pub const HOME_CONTENT_ID: &str = "main";

/// Path of the home-page aggregate.
#[must_use]
pub fn home_content_path() -> DocPath {
    DocPath::new(HOME_CONTENT_COLLECTION, HOME_CONTENT_ID)
}

/// The hero banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tagline: String,
}

impl Default for Hero {
    fn default() -> Self {
        Self {
            title: "Hey, welcome in".to_string(),
            tagline: "Builder of small apps and experiments.".to_string(),
        }
    }
}

/// The about section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct About {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub bio: String,
}

impl Default for About {
    fn default() -> Self {
        Self {
            heading: "About".to_string(),
            bio: "This is my hub, where I keep my portfolio of projects and some tools."
                .to_string(),
        }
    }
}

/// Named sub-lists of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubList {
    Updates,
    Blog,
    RecentProjects,
}

impl SubList {
    /// All sub-lists.
    pub const ALL: [Self; 3] = [Self::Updates, Self::Blog, Self::RecentProjects];

    /// Field name on the wire.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Updates => "updates",
            Self::Blog => "blog",
            Self::RecentProjects => "recentProjects",
        }
    }

    /// Whether writes re-sort the list by `date`, newest first.
    #[must_use]
    pub const fn sorted_by_date(self) -> bool {
        matches!(self, Self::Updates | Self::Blog)
    }
}

/// One entry of a sub-list.
#[derive(Debug, Clone, PartialEq)]
pub struct SubItem {
    /// Locally generated id.
    pub id: String,
    /// Every other field.
    pub fields: Fields,
}

impl SubItem {
    /// Creates an entry with a fresh local id. An `id` inside `fields` is
    /// ignored.
    #[must_use]
    pub fn new(mut fields: Fields) -> Self {
        fields.remove("id");
        Self {
            id: Uuid::now_v7().simple().to_string(),
            fields,
        }
    }

    /// The `date` field as epoch millis. Numbers are taken as millis,
    /// strings as RFC 3339 or `YYYY-MM-DD`; anything else is 0.
    #[must_use]
    pub fn date_millis(&self) -> i64 {
        match self.fields.get("date") {
            Some(Value::String(s)) => parse_date(s),
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
        .unwrap_or(0)
    }

    fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("id".into(), self.id.clone().into());
        Value::Object(object)
    }
}

fn parse_date(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Stable sort by `date`, newest first.
pub fn sort_by_date_desc(items: &mut [SubItem]) {
    items.sort_by_key(|item| std::cmp::Reverse(item.date_millis()));
}

/// The normalized home-page aggregate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HomeContent {
    pub hero: Hero,
    pub about: About,
    pub updates: Vec<SubItem>,
    pub blog: Vec<SubItem>,
    pub recent_projects: Vec<SubItem>,
}

impl HomeContent {
    /// Total normalization of the stored record. A missing document, a
    /// missing section or a mistyped list all fall back to defaults.
    #[must_use]
    pub fn from_fields(fields: Option<&Fields>) -> Self {
        let Some(fields) = fields else {
            return Self::default();
        };
        let section = |key: &str| fields.get(key).filter(|v| v.is_object()).cloned();
        Self {
            hero: section("hero")
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            about: section("about")
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            updates: sub_items(fields, SubList::Updates),
            blog: sub_items(fields, SubList::Blog),
            recent_projects: sub_items(fields, SubList::RecentProjects),
        }
    }

    /// Full record shape, as written when the document is first created.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("hero".into(), serde_json::to_value(&self.hero).unwrap_or(Value::Null));
        fields.insert("about".into(), serde_json::to_value(&self.about).unwrap_or(Value::Null));
        for list in SubList::ALL {
            fields.insert(list.field().into(), list_value(self.list(list)));
        }
        fields
    }

    /// A sub-list.
    #[must_use]
    pub fn list(&self, list: SubList) -> &[SubItem] {
        match list {
            SubList::Updates => &self.updates,
            SubList::Blog => &self.blog,
            SubList::RecentProjects => &self.recent_projects,
        }
    }
}

fn sub_items(fields: &Fields, list: SubList) -> Vec<SubItem> {
    let Some(Value::Array(values)) = fields.get(list.field()) else {
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let mut object = value.as_object()?.clone();
            let id = match object.remove("id") {
                Some(Value::String(id)) if !id.is_empty() => id,
                _ => format!("{}-{index}", list.field()),
            };
            Some(SubItem { id, fields: object })
        })
        .collect()
}

fn list_value(items: &[SubItem]) -> Value {
    Value::Array(items.iter().map(SubItem::to_value).collect())
}

/// Observable state of a [`SyncedDocumentStore`].
pub type DocumentState = LiveState<HomeContent>;

/// A subscription-backed mirror of the home-page aggregate.
pub struct SyncedDocumentStore {
    path: DocPath,
    connection: Connection,
    live: LiveHandle<HomeContent>,
}

impl SyncedDocumentStore {
    /// Opens a store over the aggregate at `path`. Must be called inside a
    /// Tokio runtime.
    pub fn open(connection: Connection, path: DocPath, config: &SyncConfig) -> Self {
        let live = LiveHandle::open(
            &connection,
            path.to_string(),
            config,
            |store| store.subscribe_document(&path),
            |fields: Option<Fields>| HomeContent::from_fields(fields.as_ref()),
        );
        Self {
            path,
            connection,
            live,
        }
    }

    /// Opens the store over `homeContent/main`.
    pub fn open_home(connection: Connection, config: &SyncConfig) -> Self {
        Self::open(connection, home_content_path(), config)
    }

    /// The mirrored document's path.
    #[must_use]
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> DocumentState {
        self.live.state()
    }

    /// The current content.
    #[must_use]
    pub fn content(&self) -> HomeContent {
        self.live.read(|state| state.data.clone())
    }

    /// Whether the first verdict is still pending.
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
    pub fn watch(&self) -> watch::Receiver<DocumentState> {
        self.live.watch()
    }

    /// Waits until the store has left the loading state (or was closed).
    pub async fn loaded(&self) -> DocumentState {
        self.live.loaded().await
    }

    /// Replaces the hero section.
    pub async fn set_hero(&self, hero: &Hero) -> SyncResult<()> {
        self.update_field("hero", serde_json::to_value(hero)?).await
    }

    /// Replaces the about section.
    pub async fn set_about(&self, about: &About) -> SyncResult<()> {
        self.update_field("about", serde_json::to_value(about)?).await
    }

    /// Overwrites one top-level field.
    pub async fn update_field(&self, field: &str, value: Value) -> SyncResult<()> {
        self.ensure_document().await?;
        let mut fields = Fields::new();
        fields.insert(field.to_string(), value);
        self.write(fields).await?;
        debug!(document = %self.path, field, "updated field");
        Ok(())
    }

    /// Appends an entry with a fresh local id and writes the whole list
    /// back. Returns the new id.
    pub async fn add_sub_item(&self, list: SubList, fields: Fields) -> SyncResult<String> {
        self.ensure_document().await?;
        let item = SubItem::new(fields);
        let id = item.id.clone();

        let mut items = self.cached(list);
        items.push(item);
        self.write_list(list, items).await?;
        debug!(document = %self.path, list = list.field(), %id, "added sub-item");
        Ok(id)
    }

    /// Merges `partial` into the entry `id` and writes the whole list back.
    /// The id itself cannot be changed.
    pub async fn update_sub_item(
        &self,
        list: SubList,
        id: &str,
        mut partial: Fields,
    ) -> SyncResult<()> {
        partial.remove("id");
        let mut items = self.cached(list);
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("{}/{}#{id}", self.path, list.field())))?;
        item.fields.extend(partial);

        self.ensure_document().await?;
        self.write_list(list, items).await?;
        debug!(document = %self.path, list = list.field(), %id, "updated sub-item");
        Ok(())
    }

    /// Drops the entry `id` and writes the whole list back. Removing an
    /// entry that is not in the cached list writes nothing.
    pub async fn remove_sub_item(&self, list: SubList, id: &str) -> SyncResult<()> {
        let mut items = self.cached(list);
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(());
        }

        self.ensure_document().await?;
        self.write_list(list, items).await?;
        debug!(document = %self.path, list = list.field(), %id, "removed sub-item");
        Ok(())
    }

    /// Stops the subscription and the load timer. Idempotent.
    pub fn close(&self) {
        if self.live.close() {
            info!(document = %self.path, "closed synced document");
        }
    }

    fn cached(&self, list: SubList) -> Vec<SubItem> {
        self.live.read(|state| state.data.list(list).to_vec())
    }

    /// Creates the document with its default shape if it does not exist.
    /// Returns whether it had to be created.
    async fn ensure_document(&self) -> SyncResult<bool> {
        let store = self.connection.store()?;
        if store.get_once(&self.path).await?.is_some() {
            return Ok(false);
        }
        let mut fields = HomeContent::default().to_fields();
        fields.insert("updatedAt".into(), server_timestamp());
        store.write_full(&self.path, fields).await?;
        info!(document = %self.path, "created document with default content");
        Ok(true)
    }

    async fn write_list(&self, list: SubList, mut items: Vec<SubItem>) -> SyncResult<()> {
        if list.sorted_by_date() {
            sort_by_date_desc(&mut items);
        }
        let mut fields = Fields::new();
        fields.insert(list.field().into(), list_value(&items));
        self.write(fields).await
    }

    async fn write(&self, mut fields: Fields) -> SyncResult<()> {
        let store = self.connection.store()?;
        fields.insert("updatedAt".into(), server_timestamp());
        store.write_merge(&self.path, fields).await
    }
}

impl Drop for SyncedDocumentStore {
    fn drop(&mut self) {
        self.close();
    }
}
