//! # Listener Registry
//!
//! Per-kind ordered sets of callbacks.
//!
//! - `on` is idempotent per callback reference (`Arc::ptr_eq`).
//! - `once` entries are removed before they run, so a panicking callback is
//!   still removed and concurrent emits cannot invoke it twice.
//! - `emit` runs callbacks synchronously in registration order against a
//!   snapshot. No lock is held while callbacks run, so a callback may call
//!   `on`/`off` on the same registry.
//! - A panicking callback is logged and skipped; the remaining callbacks run
//!   and `emit` returns normally.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Shared callback invoked with a reference to the emitted payload.
pub type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Identifier of one registration, unique within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Listener<P> {
    id: ListenerId,
    callback: Callback<P>,
    once: bool,
}

impl<P> Clone for Listener<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
            once: self.once,
        }
    }
}

/// Callback registry keyed by message kind.
pub struct ListenerRegistry<K, P> {
    /// Copy-on-write listener lists; `emit` clones the `Arc`, never the list.
    listeners: RwLock<HashMap<K, Arc<Vec<Listener<P>>>>>,
    next_id: AtomicU64,
}

impl<K, P> Default for ListenerRegistry<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> ListenerRegistry<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for `kind`.
    ///
    /// Registering the same callback again returns the existing id and does
    /// not add a second entry.
    pub fn on(&self, kind: K, callback: Callback<P>) -> ListenerId {
        self.insert(kind, callback, false)
    }

    /// Register `callback` for the next emission of `kind` only.
    pub fn once(&self, kind: K, callback: Callback<P>) -> ListenerId {
        self.insert(kind, callback, true)
    }

    fn insert(&self, kind: K, callback: Callback<P>, once: bool) -> ListenerId {
        let mut listeners = self.listeners.write();
        let entry = listeners.entry(kind.clone()).or_default();

        if let Some(existing) = entry.iter().find(|l| Arc::ptr_eq(&l.callback, &callback)) {
            return existing.id;
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Arc::make_mut(entry).push(Listener { id, callback, once });

        debug!(?kind, listener = id.0, once, "Listener registered");
        id
    }

    /// Deregister `callback` from `kind`. No-op if it is not registered.
    pub fn off(&self, kind: &K, callback: &Callback<P>) -> bool {
        self.remove_where(kind, |l| Arc::ptr_eq(&l.callback, callback))
    }

    /// Deregister by id. No-op if the id is not registered.
    pub fn off_id(&self, kind: &K, id: ListenerId) -> bool {
        self.remove_where(kind, |l| l.id == id)
    }

    fn remove_where(&self, kind: &K, matches: impl Fn(&Listener<P>) -> bool) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entry) = listeners.get_mut(kind) else {
            return false;
        };

        let Some(index) = entry.iter().position(matches) else {
            return false;
        };

        Arc::make_mut(entry).remove(index);
        if entry.is_empty() {
            listeners.remove(kind);
        }
        true
    }

    /// Invoke every callback registered for `kind`, in registration order.
    ///
    /// Returns the number of callbacks that ran (panicking ones included).
    pub fn emit(&self, kind: &K, payload: &P) -> usize {
        let snapshot = match self.listeners.read().get(kind) {
            Some(list) => Arc::clone(list),
            None => return 0,
        };

        let mut invoked = 0;
        for listener in snapshot.iter() {
            if listener.once && !self.off_id(kind, listener.id) {
                // Another emit already consumed it.
                continue;
            }

            invoked += 1;
            let callback = &listener.callback;
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                error!(?kind, listener = listener.id.0, "Listener panicked; continuing");
            }
        }

        invoked
    }

    /// Number of callbacks registered for `kind`.
    pub fn listener_count(&self, kind: &K) -> usize {
        self.listeners.read().get(kind).map_or(0, |l| l.len())
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl<K, P> fmt::Debug for ListenerRegistry<K, P>
where
    K: Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        let counts: HashMap<&K, usize> = listeners.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("ListenerRegistry").field("listeners", &counts).finish()
    }
}
