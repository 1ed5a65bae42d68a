//! HTTP API for the Folio server.
//!
//! Every single-segment path that is not one of the site's own routes is
//! treated as a short link and answered with a `307` to its target. Synced
//! collections can be inspected read-only under `/api/v1/collections`.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use clap::Parser;
use folio_routes::{Navigator, RedirectResolver, ResolveState, RouteClass, classify};
use folio_sync::{Connection, MemoryBackingStore, SyncConfig, SyncedCollectionStore};
use folio_types::{HelpfulLink, Item, PortfolioEntry, RecordKind, RedirectEntry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "folio-server")]
#[command(about = "Folio short-link and content server")]
pub struct ServerArgs {
    /// HTTP port to listen on
    #[arg(short, long, env = "FOLIO_PORT", default_value = "8080")]
    pub port: u16,

    /// JSON file to seed the in-memory backing store from
    #[arg(short, long, env = "FOLIO_SEED")]
    pub seed: Option<PathBuf>,

    /// How long a synced collection may stay silent before it reports a timeout
    #[arg(long, env = "FOLIO_LOAD_TIMEOUT_MS", default_value = "10000")]
    pub load_timeout_ms: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    /// Store configuration derived from the flags.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::with_load_timeout(Duration::from_millis(self.load_timeout_ms))
    }
}

/// Reads a seed file into a fresh in-memory store.
pub async fn load_seed(path: &FsPath) -> Result<MemoryBackingStore> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seed: serde_json::Value =
        serde_json::from_str(&raw).context("seed file is not valid JSON")?;
    let store = MemoryBackingStore::new();
    let count = store.load_json(&seed).context("seed file has an invalid shape")?;
    info!(records = count, path = %path.display(), "seeded backing store");
    Ok(store)
}

/// Builds the process-wide connection. A missing seed file means an empty
/// store; an unreadable or invalid one fails closed as misconfigured.
pub async fn connect(seed: Option<&FsPath>) -> Connection {
    let Some(path) = seed else {
        return Connection::ready(MemoryBackingStore::new());
    };
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!(path = %path.display(), "seed file not found, starting empty");
        return Connection::ready(MemoryBackingStore::new());
    }
    match load_seed(path).await {
        Ok(store) => Connection::ready(store),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "backing store misconfigured");
            Connection::Misconfigured(format!("{e:#}"))
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    connection: Connection,
    collections: Arc<BTreeMap<&'static str, SyncedCollectionStore>>,
}

impl AppState {
    /// Opens a synced store for every collection the site serves. Must be
    /// called inside a Tokio runtime.
    pub fn new(connection: Connection, config: &SyncConfig) -> Self {
        let mut collections = BTreeMap::new();
        for (name, policy) in [
            (HelpfulLink::COLLECTION, HelpfulLink::SORT),
            (PortfolioEntry::COLLECTION, PortfolioEntry::SORT),
            (RedirectEntry::COLLECTION, RedirectEntry::SORT),
        ] {
            let store = SyncedCollectionStore::open(connection.clone(), name, policy, config);
            collections.insert(name, store);
        }
        Self {
            connection,
            collections: Arc::new(collections),
        }
    }

    /// The injected connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

/// Body of `GET /api/v1/collections/{name}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CollectionResponse {
    pub collection: String,
    pub items: Vec<Item>,
    pub generation: u64,
    pub loading: bool,
    pub error: Option<String>,
}

/// Body of `GET /`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IndexResponse {
    pub service: String,
    pub backend: String,
    pub collections: Vec<String>,
}

async fn index_handler(State(state): State<AppState>) -> Json<IndexResponse> {
    let backend = match &state.connection {
        Connection::Ready(store) => store.backend_name().to_string(),
        Connection::Misconfigured(_) => "misconfigured".to_string(),
        Connection::Unconfigured => "none".to_string(),
    };
    Json(IndexResponse {
        service: "folio".to_string(),
        backend,
        collections: state.collections.keys().map(|name| name.to_string()).collect(),
    })
}

async fn collection_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let Some(store) = state.collections.get(name.as_str()) else {
        let body = json!({ "collection": name, "error": "unknown collection" });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    };
    let snapshot = store.state();
    Json(CollectionResponse {
        collection: name,
        items: snapshot.data,
        generation: snapshot.generation,
        loading: snapshot.is_loading,
        error: snapshot.error.map(|e| e.to_string()),
    })
    .into_response()
}

async fn route_handler(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let slug = match classify(&path) {
        RouteClass::Reserved(route) => {
            debug!(%route, "reserved route");
            let body = json!({ "route": route, "reserved": true });
            return (StatusCode::NOT_FOUND, Json(body)).into_response();
        }
        RouteClass::Candidate(slug) => slug,
    };

    let navigator: Arc<dyn Navigator> = Arc::new(|url: &str| debug!(%url, "replacing location"));
    let resolver = RedirectResolver::start(&state.connection, &slug, navigator);
    match resolver.settled().await {
        ResolveState::Found(url) if HeaderValue::from_str(&url).is_ok() => {
            Redirect::temporary(&url).into_response()
        }
        ResolveState::Found(url) => {
            warn!(%slug, url = ?url, "stored url is not a valid location");
            let body = json!({
                "slug": slug,
                "status": "error",
                "error": "stored url is not a valid location",
                "home": "/",
            });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
        ResolveState::NotFound => {
            let body = json!({ "slug": slug, "status": "not_found", "home": "/" });
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
        ResolveState::Error(reason) => {
            let body = json!({ "slug": slug, "status": "error", "error": reason, "home": "/" });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
        ResolveState::Loading => {
            let body = json!({ "slug": slug, "status": "error", "home": "/" });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

/// Build the HTTP router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/v1/collections/{name}", get(collection_handler))
        .route("/{*path}", get(route_handler))
        .with_state(state)
}
