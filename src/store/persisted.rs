//! Persisted Store
//!
//! Holds the notification list and the chat history. Every mutation
//! publishes a fresh immutable snapshot to subscribers and writes the
//! whole state through to session storage as JSON.
//!
//! Write path: stored snapshot + mutation → JSON → storage → new `Arc<StoreSnapshot>` → watch channel
//! Read path: `snapshot()` or a `subscribe()` receiver, never a lock on live state
//!
//! Several stores (or processes) may share one storage slot. Each mutation
//! is applied to the stored snapshot under the slot's lock, so concurrent
//! writers append to each other's state instead of replacing it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::backend::SessionStorage;
use super::error::{StoreError, StoreResult};
use crate::models::{ChatMessage, PushNotification};

/// Session storage key holding the snapshot
pub const STORE_KEY: &str = "healthAppNotifs";

/// Snapshot format version written into the envelope
pub const SNAPSHOT_VERSION: u32 = 0;

/// Immutable view of the store contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub notifications: Vec<PushNotification>,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
}

impl StoreSnapshot {
    /// Notifications not yet read, for the header badge
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

/// On-disk shape: `{"state": {...}, "version": 0}`
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<S> {
    state: S,
    #[serde(default)]
    version: u32,
}

/// Serialize a snapshot into its persisted form
pub fn encode_snapshot(snapshot: &StoreSnapshot) -> StoreResult<String> {
    let envelope = Envelope {
        state: snapshot,
        version: SNAPSHOT_VERSION,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse a persisted snapshot
pub fn decode_snapshot(raw: &str) -> StoreResult<StoreSnapshot> {
    let envelope: Envelope<StoreSnapshot> = serde_json::from_str(raw)?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion(envelope.version));
    }
    Ok(envelope.state)
}

/// Reactive notification/chat store with write-through persistence
///
/// Clones share state.
#[derive(Clone)]
pub struct PersistedStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn SessionStorage>,
    key: String,
    tx: watch::Sender<Arc<StoreSnapshot>>,
    /// Serializes mutate+persist so storage never lags behind an older snapshot
    write_lock: Mutex<()>,
    persist_failures: AtomicU64,
    /// Memory holds changes storage does not; merge from memory until a write succeeds
    dirty: AtomicBool,
}

impl PersistedStore {
    /// Open the store under [`STORE_KEY`], rehydrating if a snapshot exists
    pub fn open(storage: Arc<dyn SessionStorage>) -> Self {
        Self::open_with_key(storage, STORE_KEY)
    }

    /// Open the store under a custom key
    pub fn open_with_key(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let initial = match Self::rehydrate(storage.as_ref(), &key) {
            Ok(Some(snapshot)) => {
                tracing::debug!(
                    key = %key,
                    notifications = snapshot.notifications.len(),
                    chat_messages = snapshot.chat_messages.len(),
                    "Rehydrated store"
                );
                snapshot
            }
            Ok(None) => StoreSnapshot::default(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable store snapshot");
                StoreSnapshot::default()
            }
        };

        let (tx, _) = watch::channel(Arc::new(initial));

        Self {
            inner: Arc::new(Inner {
                storage,
                key,
                tx,
                write_lock: Mutex::new(()),
                persist_failures: AtomicU64::new(0),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    fn rehydrate(storage: &dyn SessionStorage, key: &str) -> StoreResult<Option<StoreSnapshot>> {
        match storage.get_item(key)? {
            Some(raw) => decode_snapshot(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Current contents
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.inner.tx.borrow())
    }

    /// Receiver that is marked changed after every mutation
    pub fn subscribe(&self) -> watch::Receiver<Arc<StoreSnapshot>> {
        self.inner.tx.subscribe()
    }

    pub fn notifications(&self) -> Vec<PushNotification> {
        self.snapshot().notifications.clone()
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.snapshot().chat_messages.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.snapshot().unread_count()
    }

    /// Append a notification
    pub fn add_notification(&self, notification: PushNotification) {
        self.mutate(|state| state.notifications.push(notification));
    }

    /// Empty the notification list
    pub fn clear_notifications(&self) {
        self.mutate(|state| state.notifications.clear());
    }

    /// Append a chat message
    pub fn add_chat_message(&self, message: ChatMessage) {
        self.mutate(|state| state.chat_messages.push(message));
    }

    /// Empty the chat history
    pub fn clear_chat_messages(&self) {
        self.mutate(|state| state.chat_messages.clear());
    }

    /// Write the current snapshot to storage, reporting failure to the caller
    ///
    /// Replaces whatever the slot holds with this store's view.
    pub fn persist_now(&self) -> StoreResult<()> {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let encoded = encode_snapshot(&self.snapshot())?;
        self.inner.storage.set_item(&self.inner.key, &encoded)?;
        self.inner.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Number of write-throughs that failed since the store was opened
    pub fn persist_failures(&self) -> u64 {
        self.inner.persist_failures.load(Ordering::Relaxed)
    }

    fn mutate(&self, apply: impl FnOnce(&mut StoreSnapshot)) {
        // A poisoned lock only means another writer panicked; the snapshot is still whole
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let local = self.snapshot();
        let dirty = self.inner.dirty.load(Ordering::Relaxed);
        let mut apply = Some(apply);
        let mut merged: Option<StoreSnapshot> = None;

        let result = self.inner.storage.update_item(&self.inner.key, &mut |stored| {
            let mut state = match stored.as_deref().map(decode_snapshot) {
                Some(Ok(stored)) if !dirty => stored,
                Some(Err(e)) => {
                    tracing::warn!(key = %self.inner.key, error = %e, "Overwriting unreadable store snapshot");
                    StoreSnapshot::clone(&local)
                }
                _ => StoreSnapshot::clone(&local),
            };
            if let Some(apply) = apply.take() {
                apply(&mut state);
            }
            let encoded = encode_snapshot(&state)?;
            merged = Some(state);
            Ok(encoded)
        });

        let next = match merged {
            Some(state) => state,
            None => {
                let mut state = StoreSnapshot::clone(&local);
                if let Some(apply) = apply.take() {
                    apply(&mut state);
                }
                state
            }
        };
        self.inner.tx.send_replace(Arc::new(next));

        match result {
            Ok(()) => self.inner.dirty.store(false, Ordering::Relaxed),
            Err(e) => {
                self.inner.dirty.store(true, Ordering::Relaxed);
                self.inner.persist_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %self.inner.key, error = %e, "Failed to persist store snapshot");
            }
        }
    }
}

impl std::fmt::Debug for PersistedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("PersistedStore")
            .field("key", &self.inner.key)
            .field("notifications", &snapshot.notifications.len())
            .field("chat_messages", &snapshot.chat_messages.len())
            .finish()
    }
}
