//! Local Session Store - durable per-test snapshots with change notification.
//!
//! The store keeps every snapshot in a single [`LocalDocument`] under
//! [`STORAGE_KEY`] of a synchronous [`StorageBackend`]. Reads always go to the
//! backend, so a write made by another process sharing the backend is visible
//! to the next `get` even before its change event has been delivered.
//!
//! Failures never propagate: an unreadable or malformed document reads as
//! empty, and a failed write is logged and dropped.

use crate::{
    error::Result, Clock, Error, LocalDocument, Origin, TestId, TestSessionSnapshot,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Key under which the local document is stored.
pub const STORAGE_KEY: &str = "autotest-test-state";

/// A synchronous keyed string store.
pub trait StorageBackend: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent.
    fn read(&self, key: &str) -> Result<Option<String>>;
    /// Replace a value.
    fn write(&self, key: &str, value: &str) -> Result<()>;
    /// Delete a value. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
    /// Whether the backend can persist anything at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Run `update` while holding the backend's exclusive lock, so a
    /// read-modify-write cannot interleave with another writer sharing the
    /// same storage. `update` must not re-enter the lock.
    fn exclusive(&self, update: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        update()
    }
}

/// In-memory backend.
///
/// Share one instance between several stores (via `Arc`) to model several
/// processes looking at the same durable storage.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Backend used when durable storage is disabled: nothing is ever stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl StorageBackend for UnavailableBackend {
    fn read(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Storage("storage unavailable".into()))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// A snapshot was written or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub test_id: TestId,
    /// `None` when the snapshot was deleted
    pub snapshot: Option<TestSessionSnapshot>,
    pub previous: Option<TestSessionSnapshot>,
    pub origin: Origin,
}

impl ChangeEvent {
    /// Category of the new snapshot, else of the deleted one.
    pub fn category(&self) -> Option<&str> {
        self.snapshot
            .as_ref()
            .or(self.previous.as_ref())
            .map(|s| s.category.as_str())
    }
}

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

type SharedListeners = Arc<Mutex<Listeners>>;

fn lock_listeners(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle returned by [`SessionStore::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Stop receiving events.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock_listeners(&listeners)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Durable key-value store of [`TestSessionSnapshot`]s, keyed by test id.
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    listeners: SharedListeners,
    /// Document as of the last write or sync, used to diff external changes
    last_seen: Mutex<LocalDocument>,
}

impl SessionStore {
    /// Create a store over `backend`, stamping writes with `clock`.
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        if !backend.is_available() {
            tracing::warn!("local storage unavailable, test progress will not be kept");
        }

        let store = Self {
            backend,
            clock,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            last_seen: Mutex::new(LocalDocument::default()),
        };
        let document = store.read_document();
        *store.last_seen() = document;
        store
    }

    /// Whether writes can persist.
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Get an owned copy of the snapshot for `test_id`.
    pub fn get(&self, test_id: &str) -> Option<TestSessionSnapshot> {
        let mut snapshot = self.read_document().tests.remove(test_id)?;
        snapshot.test_id = test_id.to_string();
        Some(snapshot)
    }

    /// Write or delete the snapshot for `test_id`.
    ///
    /// The stored snapshot is keyed by `test_id` regardless of its own
    /// `test_id` field, and gets `updated_at = now` when it has none. Returns
    /// the stored value, or `None` for a delete or a dropped write.
    pub fn set(
        &self,
        test_id: &str,
        snapshot: Option<TestSessionSnapshot>,
    ) -> Option<TestSessionSnapshot> {
        let snapshot = match snapshot {
            None => None,
            Some(mut snapshot) => {
                snapshot.test_id = test_id.to_string();
                snapshot.updated_at.get_or_insert_with(|| self.clock.now());
                if let Err(e) = snapshot.validate() {
                    tracing::warn!(test_id = %test_id, error = %e, "refusing to store invalid snapshot");
                    return None;
                }
                Some(snapshot)
            }
        };

        // Changes made by other writers since the last sync are reported
        // before the local one, and never folded silently into `last_seen`.
        let mut events = Vec::new();
        let mut stored = None;
        let outcome = self.backend.exclusive(&mut || {
            let mut document = self.read_document();
            let mut last_seen = self.last_seen();
            events = external_changes(&last_seen, &document);
            *last_seen = document.clone();

            let previous = document.tests.get(test_id).cloned();
            match &snapshot {
                None if previous.is_none() => return Ok(()),
                None => {
                    document.tests.remove(test_id);
                }
                Some(snapshot) => {
                    document.tests.insert(test_id.to_string(), snapshot.clone());
                }
            }

            self.write_document(&document)?;
            *last_seen = document;
            stored = snapshot.clone();
            events.push(ChangeEvent {
                test_id: test_id.to_string(),
                snapshot: snapshot.clone(),
                previous,
                origin: Origin::Local,
            });
            Ok(())
        });

        match outcome {
            Ok(()) => {
                tracing::trace!(test_id = %test_id, deleted = stored.is_none(), "test state persisted");
            }
            Err(e) => {
                tracing::warn!(test_id = %test_id, error = %e, "failed to persist test state");
            }
        }
        for event in &events {
            self.emit(event);
        }

        stored
    }

    /// Delete the snapshot for `test_id`.
    pub fn clear(&self, test_id: &str) {
        self.set(test_id, None);
    }

    /// All snapshots in `category`, in no particular order.
    pub fn list_by_category(&self, category: &str) -> Vec<TestSessionSnapshot> {
        self.read_document()
            .tests
            .into_values()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Every stored snapshot.
    pub fn all(&self) -> Vec<TestSessionSnapshot> {
        self.read_document().tests.into_values().collect()
    }

    /// Register a listener for every change, local or external.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut listeners = lock_listeners(&self.listeners);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, Arc::new(listener)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock_listeners(&self.listeners).entries.len()
    }

    /// Pick up writes made by other processes sharing the backend.
    ///
    /// Diffs the backend document against the last one this store saw and
    /// emits an [`Origin::External`] event for each test id that changed.
    /// Returns the number of events emitted.
    pub fn sync_from_backend(&self) -> usize {
        let current = self.read_document();
        let events = {
            let mut last_seen = self.last_seen();
            let events = external_changes(&last_seen, &current);
            *last_seen = current;
            events
        };

        for event in &events {
            self.emit(event);
        }
        if !events.is_empty() {
            tracing::debug!(changes = events.len(), "picked up external test state changes");
        }
        events.len()
    }

    fn read_document(&self) -> LocalDocument {
        let raw = match self.backend.read(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LocalDocument::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored test state");
                return LocalDocument::default();
            }
        };

        LocalDocument::from_json(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding unreadable stored test state");
            LocalDocument::default()
        })
    }

    fn write_document(&self, document: &LocalDocument) -> Result<()> {
        if document.tests.is_empty() {
            return self.backend.remove(STORAGE_KEY);
        }
        self.backend.write(STORAGE_KEY, &document.to_json()?)
    }

    fn last_seen(&self) -> MutexGuard<'_, LocalDocument> {
        self.last_seen.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: &ChangeEvent) {
        // Listeners run outside the lock so they may subscribe or read the store.
        let listeners: Vec<Listener> = lock_listeners(&self.listeners)
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("available", &self.backend.is_available())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// One [`Origin::External`] event per test id that differs between documents.
fn external_changes(previous: &LocalDocument, current: &LocalDocument) -> Vec<ChangeEvent> {
    let ids: BTreeSet<&TestId> = previous.tests.keys().chain(current.tests.keys()).collect();
    ids.into_iter()
        .filter_map(|id| {
            let before = previous.tests.get(id);
            let after = current.tests.get(id);
            (before != after).then(|| ChangeEvent {
                test_id: id.clone(),
                snapshot: after.cloned(),
                previous: before.cloned(),
                origin: Origin::External,
            })
        })
        .collect()
}
