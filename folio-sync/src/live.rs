//! The loading/error/timeout state machine shared by both store kinds.
//!
//! A store's observable state lives in a `watch` channel. Every transition
//! happens inside `send_if_modified`, under the channel's own lock, and
//! checks the `closed` flag first; once `close` has returned no transition
//! can land.
//!
//! [`LiveHandle`] owns the whole lifecycle of one store: the state cell,
//! the channel subscription and the task draining it. The store types only
//! add their own snapshot shape and mutations on top.

use crate::channel::{BackingStore, ChannelEvent, Subscription, Unsubscribe};
use crate::config::SyncConfig;
use crate::connection::Connection;
use crate::error::{StoreError, SyncResult};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Observable state of a synced store.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveState<T> {
    /// The current snapshot, replaced wholesale on every event.
    pub data: T,
    /// Bumped on every replacement, including fail-safe emptying.
    pub generation: u64,
    /// True until the first event, error or timeout.
    pub is_loading: bool,
    /// Set by channel errors, the timeout, or a misconfigured backend.
    pub error: Option<StoreError>,
    /// True once the store has been closed; nothing changes afterwards.
    pub closed: bool,
}

impl<T: Default> LiveState<T> {
    pub(crate) fn loading() -> Self {
        Self {
            data: T::default(),
            generation: 0,
            is_loading: true,
            error: None,
            closed: false,
        }
    }

    pub(crate) fn idle() -> Self {
        Self {
            is_loading: false,
            ..Self::loading()
        }
    }

    pub(crate) fn failed(error: StoreError) -> Self {
        Self {
            is_loading: false,
            error: Some(error),
            ..Self::loading()
        }
    }
}

/// Lifecycle of one synced store.
pub(crate) struct LiveHandle<T> {
    cell: Arc<LiveCell<T>>,
    unsubscribe: Unsubscribe,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> LiveHandle<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Subscribes through `connection` and starts draining events. Must be
    /// called inside a Tokio runtime.
    ///
    /// A misconfigured connection or a refused subscription settles at once
    /// with an error; an unconfigured one settles idle and empty.
    pub(crate) fn open<E: Send + 'static>(
        connection: &Connection,
        label: String,
        config: &SyncConfig,
        subscribe: impl FnOnce(&Arc<dyn BackingStore>) -> SyncResult<Subscription<E>>,
        normalize: impl Fn(E) -> T + Send + 'static,
    ) -> Self {
        let store = match connection {
            Connection::Ready(store) => store,
            Connection::Misconfigured(reason) => {
                return Self::settled(LiveState::failed(StoreError::Configuration(reason.clone())));
            }
            Connection::Unconfigured => return Self::settled(LiveState::idle()),
        };

        let subscription = match subscribe(store) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(store = %label, error = %e, "subscription refused");
                return Self::settled(LiveState::failed(e.into()));
            }
        };
        info!(store = %label, backend = store.backend_name(), "opened synced store");

        let cell = Arc::new(LiveCell::new(LiveState::loading()));
        let task = tokio::spawn(pump(
            subscription.events,
            cell.clone(),
            config.load_timeout,
            label,
            normalize,
        ));
        Self {
            cell,
            unsubscribe: subscription.unsubscribe,
            task: Mutex::new(Some(task)),
        }
    }

    fn settled(state: LiveState<T>) -> Self {
        Self {
            cell: Arc::new(LiveCell::new(state)),
            unsubscribe: Unsubscribe::noop(),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&LiveState<T>) -> R) -> R {
        self.cell.read(f)
    }

    pub(crate) fn state(&self) -> LiveState<T> {
        self.read(Clone::clone)
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.read(|state| state.is_loading)
    }

    pub(crate) fn error(&self) -> Option<StoreError> {
        self.read(|state| state.error.clone())
    }

    pub(crate) fn watch(&self) -> watch::Receiver<LiveState<T>> {
        self.cell.subscribe()
    }

    /// Waits until the store has left the loading state or was closed.
    pub(crate) async fn loaded(&self) -> LiveState<T> {
        let mut rx = self.watch();
        match rx.wait_for(|state| !state.is_loading || state.closed).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Freezes the state, unsubscribes and stops the pump. Idempotent;
    /// returns whether the store was still open.
    pub(crate) fn close(&self) -> bool {
        let was_open = self.cell.close();
        self.unsubscribe.call();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        was_open
    }
}

struct LiveCell<T> {
    tx: watch::Sender<LiveState<T>>,
}

impl<T: Default> LiveCell<T> {
    fn new(initial: LiveState<T>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    fn subscribe(&self) -> watch::Receiver<LiveState<T>> {
        self.tx.subscribe()
    }

    fn read<R>(&self, f: impl FnOnce(&LiveState<T>) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Installs a new snapshot. Returns false if the cell is closed.
    fn replace(&self, data: T) -> bool {
        self.tx.send_if_modified(|state| {
            if state.closed {
                return false;
            }
            state.data = data;
            state.generation += 1;
            state.is_loading = false;
            state.error = None;
            true
        })
    }

    /// Empties the snapshot and records `error`. Returns false if closed.
    fn fail(&self, error: StoreError) -> bool {
        self.tx.send_if_modified(|state| {
            if state.closed {
                return false;
            }
            state.data = T::default();
            state.generation += 1;
            state.is_loading = false;
            state.error = Some(error);
            true
        })
    }

    /// Marks the cell closed. Returns whether it was open.
    fn close(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.closed {
                return false;
            }
            state.closed = true;
            true
        })
    }
}

/// Drains channel events into `cell` until the channel ends or the cell is
/// closed. The load timer is armed until the first event of either kind.
async fn pump<E, T>(
    mut events: mpsc::UnboundedReceiver<ChannelEvent<E>>,
    cell: Arc<LiveCell<T>>,
    load_timeout: Duration,
    label: String,
    normalize: impl Fn(E) -> T,
) where
    T: Default,
{
    let deadline = tokio::time::sleep(load_timeout);
    tokio::pin!(deadline);
    let mut settled = false;

    loop {
        tokio::select! {
            biased;
            event = events.recv() => {
                let Some(event) = event else {
                    if !settled {
                        // The channel hung up without a word; it still owes
                        // us a verdict once the window closes.
                        (&mut deadline).await;
                        warn!(store = %label, "channel ended before responding");
                        cell.fail(StoreError::Timeout(load_timeout));
                    }
                    debug!(store = %label, "channel ended");
                    break;
                };
                settled = true;
                let open = match event {
                    ChannelEvent::Snapshot(raw) => {
                        let open = cell.replace(normalize(raw));
                        debug!(store = %label, "snapshot replaced");
                        open
                    }
                    ChannelEvent::Error(reason) => {
                        warn!(store = %label, %reason, "channel reported an error");
                        cell.fail(StoreError::Channel(reason))
                    }
                };
                if !open {
                    break;
                }
            }
            () = &mut deadline, if !settled => {
                settled = true;
                warn!(store = %label, timeout = ?load_timeout, "no response from backing store");
                if !cell.fail(StoreError::Timeout(load_timeout)) {
                    break;
                }
            }
        }
    }
}
