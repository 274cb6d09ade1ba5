//! # Result Cache
//!
//! Keyed TTL cache with in-flight coalescing.
//!
//! | Entry state            | `fetch` without `force`                  |
//! |------------------------|------------------------------------------|
//! | none / expired         | start a fetch, store it as pending       |
//! | pending                | await the same shared fetch              |
//! | settled `Ok`, live     | return the data                          |
//! | settled `Err`, live    | return the error again                   |
//!
//! `force` always starts a new fetch that supersedes the entry. Each entry
//! carries a generation, so a superseded fetch settling late cannot overwrite
//! its replacement. Pending entries do not expire.
//!
//! Errors accepted by the [`ResultCache::evicting`] filter are returned to the
//! callers of that fetch and then dropped instead of being cached.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use relay_types::{Clock, SystemClock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default time-to-live of a settled entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

enum EntryState<T, E>
where
    T: Clone,
    E: Clone,
{
    Pending(SharedFetch<T, E>),
    Settled(Result<T, E>),
}

struct Entry<T, E>
where
    T: Clone,
    E: Clone,
{
    generation: u64,
    state: EntryState<T, E>,
    /// Creation time while pending, settle time once settled.
    timestamp_ms: u64,
}

/// Per-call cache options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Overrides the cache's default TTL.
    pub ttl: Option<Duration>,
    /// Ignore any existing entry.
    pub force: bool,
}

impl FetchOptions {
    pub fn forced() -> Self {
        Self {
            ttl: None,
            force: true,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            force: false,
        }
    }
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Underlying fetches started
    pub fetches: AtomicU64,
    /// Calls answered from a settled entry
    pub hits: AtomicU64,
    /// Calls that joined an in-flight fetch
    pub coalesced: AtomicU64,
}

pub struct ResultCache<T, E>
where
    T: Clone,
    E: Clone,
{
    entries: Mutex<HashMap<String, Entry<T, E>>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    next_generation: AtomicU64,
    stats: CacheStats,
    evict_error: Option<fn(&E) -> bool>,
}

impl<T, E> ResultCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            default_ttl,
            next_generation: AtomicU64::new(1),
            stats: CacheStats::default(),
            evict_error: None,
        }
    }

    /// Never cache errors for which `evict` returns true.
    pub fn evicting(mut self, evict: fn(&E) -> bool) -> Self {
        self.evict_error = Some(evict);
        self
    }

    /// Return the cached result for `key`, or run `fetcher` to produce it.
    pub async fn fetch<F, Fut>(&self, key: &str, options: FetchOptions, fetcher: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let ttl_ms = options.ttl.unwrap_or(self.default_ttl).as_millis() as u64;

        let (generation, shared) = {
            let mut entries = self.entries.lock();
            let now = self.clock.now_ms();

            let reusable = match entries.get(key) {
                Some(entry) if !options.force => match &entry.state {
                    EntryState::Settled(result) if now.saturating_sub(entry.timestamp_ms) < ttl_ms => {
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                        return result.clone();
                    }
                    EntryState::Pending(shared) => {
                        self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                        Some((entry.generation, shared.clone()))
                    }
                    EntryState::Settled(_) => None,
                },
                _ => None,
            };

            match reusable {
                Some(found) => found,
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let shared = fetcher().boxed().shared();
                    entries.insert(
                        key.to_string(),
                        Entry {
                            generation,
                            state: EntryState::Pending(shared.clone()),
                            timestamp_ms: now,
                        },
                    );
                    self.stats.fetches.fetch_add(1, Ordering::Relaxed);
                    debug!(key, generation, force = options.force, "Cache fetch started");
                    (generation, shared)
                }
            }
        };

        let result = shared.await;
        self.settle(key, generation, &result);
        result
    }

    /// Record a settled fetch unless a newer generation replaced it.
    fn settle(&self, key: &str, generation: u64, result: &Result<T, E>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.generation != generation || !matches!(entry.state, EntryState::Pending(_)) {
            return;
        }

        let evict = match (result, self.evict_error) {
            (Err(e), Some(evict)) => evict(e),
            _ => false,
        };
        if evict {
            entries.remove(key);
            debug!(key, generation, "Cache entry evicted after error");
        } else {
            entry.state = EntryState::Settled(result.clone());
            entry.timestamp_ms = self.clock.now_ms();
        }
    }

    /// Drop the entry for `key`.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
