//! Administration of the `redirects` collection.

use crate::error::{RedirectError, RedirectResult};
use crate::slug::validate_slug;
use folio_sync::{Connection, StoreError, SyncConfig, SyncedCollectionStore};
use folio_types::{Fields, RecordKind, RedirectEntry, server_timestamp};
use tracing::info;

/// A live, newest-first view of every short link plus the writes that
/// manage them.
///
/// Records are keyed by slug. Two sessions adding the same slug race on
/// that key; which one survives is up to the backing store.
pub struct RedirectBook {
    store: SyncedCollectionStore,
}

impl RedirectBook {
    /// Opens the book. Must be called inside a Tokio runtime.
    pub fn open(connection: Connection, config: &SyncConfig) -> Self {
        Self {
            store: SyncedCollectionStore::open_kind::<RedirectEntry>(connection, config),
        }
    }

    /// Creates or replaces the short link for `slug`. Returns the stored
    /// (normalized) slug. Nothing is written when validation fails.
    pub async fn add(&self, slug: &str, url: &str) -> RedirectResult<String> {
        let slug = validate_slug(slug)?;
        let url = non_empty_url(url)?;

        let mut fields = RedirectEntry {
            slug: slug.clone(),
            url,
            created_at: None,
        }
        .to_fields();
        fields.insert("createdAt".into(), server_timestamp());

        self.store.set(&slug, fields).await?;
        info!(%slug, "short link saved");
        Ok(slug)
    }

    /// Points an existing short link at a new url.
    pub async fn update(&self, slug: &str, url: &str) -> RedirectResult<()> {
        let url = non_empty_url(url)?;
        let mut fields = Fields::new();
        fields.insert("url".into(), url.into());
        self.store.update(slug, fields).await?;
        info!(%slug, "short link updated");
        Ok(())
    }

    /// Deletes a short link.
    pub async fn remove(&self, slug: &str) -> RedirectResult<()> {
        self.store.remove(slug).await?;
        info!(%slug, "short link removed");
        Ok(())
    }

    /// Every short link, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<RedirectEntry> {
        self.store.items_as::<RedirectEntry>()
    }

    /// Looks up a slug in the synced snapshot.
    #[must_use]
    pub fn find(&self, slug: &str) -> Option<RedirectEntry> {
        self.store.get(slug).map(|item| RedirectEntry::from_item(&item))
    }

    /// Whether the first snapshot is still pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    /// The store's current error, if any.
    #[must_use]
    pub fn error(&self) -> Option<StoreError> {
        self.store.error()
    }

    /// Waits for the first verdict.
    pub async fn loaded(&self) {
        self.store.loaded().await;
    }

    /// The underlying collection store.
    #[must_use]
    pub fn store(&self) -> &SyncedCollectionStore {
        &self.store
    }

    /// Stops syncing. Idempotent.
    pub fn close(&self) {
        self.store.close();
    }
}

fn non_empty_url(url: &str) -> RedirectResult<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(RedirectError::EmptyUrl);
    }
    if url.chars().any(char::is_control) {
        return Err(RedirectError::InvalidUrl(url.to_string()));
    }
    Ok(url.to_string())
}
