//! One-shot resolution of a short-link slug.
//!
//! A resolver issues a single point read for `redirects/{slug}` and lands
//! in one terminal state. When the record holds a url it also performs
//! exactly one navigation through the injected [`Navigator`].
//!
//! Cancellation is explicit: once [`RedirectResolver::cancel`] returns, a
//! lookup that settles afterwards is discarded without a state change or a
//! navigation. The check and the state change share one lock, so a lookup
//! settles either entirely before cancellation or not at all. Navigation
//! runs after the lock is released, so a navigator may cancel or drop its
//! own resolver.

use folio_sync::{Connection, SyncError};
use folio_types::{DocPath, Fields, RecordKind, RedirectEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Replaces the current location. Called at most once per resolver.
pub trait Navigator: Send + Sync {
    fn replace(&self, url: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn replace(&self, url: &str) {
        self(url)
    }
}

/// Resolver state. Everything but `Loading` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ResolveState {
    Loading,
    /// The slug maps to this url; navigation has been issued.
    Found(String),
    /// No record, an empty url, or no backing store at all.
    NotFound,
    /// The lookup failed or the store is misconfigured.
    Error(String),
}

impl ResolveState {
    /// Whether the state can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Resolves one slug.
pub struct RedirectResolver {
    slug: String,
    state: watch::Receiver<ResolveState>,
    cancelled: Arc<Mutex<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RedirectResolver {
    /// Starts resolving `slug`. Must be called inside a Tokio runtime.
    ///
    /// An empty slug or an unconfigured connection settles immediately as
    /// `NotFound`; a misconfigured one as `Error`.
    pub fn start(connection: &Connection, slug: &str, navigator: Arc<dyn Navigator>) -> Self {
        let slug = slug.to_string();
        let cancelled = Arc::new(Mutex::new(false));

        let store = match connection {
            _ if slug.is_empty() => return Self::immediate(slug, ResolveState::NotFound),
            Connection::Unconfigured => return Self::immediate(slug, ResolveState::NotFound),
            Connection::Misconfigured(reason) => {
                return Self::immediate(slug, ResolveState::Error(reason.clone()));
            }
            Connection::Ready(store) => store.clone(),
        };

        let (tx, rx) = watch::channel(ResolveState::Loading);
        let path = DocPath::new(RedirectEntry::COLLECTION, slug.as_str());
        let guard = cancelled.clone();
        let task = tokio::spawn(async move {
            let lookup = store.get_once(&path).await;

            let state = {
                let cancelled = guard.lock().unwrap_or_else(PoisonError::into_inner);
                if *cancelled {
                    debug!(slug = path.id(), "lookup settled after cancellation, discarded");
                    return;
                }
                let state = outcome(lookup);
                tx.send_replace(state.clone());
                state
            };
            match &state {
                ResolveState::Found(url) => {
                    info!(slug = path.id(), %url, "short link resolved");
                    navigator.replace(url);
                }
                ResolveState::NotFound => debug!(slug = path.id(), "short link not found"),
                ResolveState::Error(reason) => {
                    warn!(slug = path.id(), %reason, "short link lookup failed");
                }
                ResolveState::Loading => {}
            }
        });

        Self {
            slug,
            state: rx,
            cancelled,
            task: Mutex::new(Some(task)),
        }
    }

    fn immediate(slug: String, state: ResolveState) -> Self {
        debug!(%slug, ?state, "short link settled without lookup");
        let (_tx, rx) = watch::channel(state);
        Self {
            slug,
            state: rx,
            cancelled: Arc::new(Mutex::new(false)),
            task: Mutex::new(None),
        }
    }

    /// The slug being resolved.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> ResolveState {
        self.state.borrow().clone()
    }

    /// Watches state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ResolveState> {
        self.state.clone()
    }

    /// Waits for a terminal state. Returns `Loading` if the resolver was
    /// cancelled first.
    pub async fn settled(&self) -> ResolveState {
        let mut rx = self.state.clone();
        match rx.wait_for(ResolveState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Discards any pending lookup. Idempotent.
    pub fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            debug!(slug = %self.slug, "resolver cancelled");
        }
    }
}

impl Drop for RedirectResolver {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn outcome(lookup: Result<Option<Fields>, SyncError>) -> ResolveState {
    match lookup {
        Ok(Some(fields)) => match fields.get("url").and_then(Value::as_str).map(str::trim) {
            Some(url) if !url.is_empty() => ResolveState::Found(url.to_string()),
            _ => ResolveState::NotFound,
        },
        Ok(None) => ResolveState::NotFound,
        Err(e) => ResolveState::Error(e.to_string()),
    }
}
