//! In-memory fetch cache with request coalescing.
//!
//! Each cache key maps to one shared fetch operation, pending or finished.
//! The lookup and the installation of a new operation happen under one lock
//! with no await in between, so two fetches for the same key can never be in
//! flight at once. The network work runs on a spawned task: callers that stop
//! waiting do not cancel it, and the result still lands in the cache.
//!
//! Failures are never cached. A failed operation removes its own slot, and
//! callers evict explicitly when a later stage (verification, sanitization)
//! rejects a result. Those evictions name the [`SlotId`] they observed, so a
//! stale rejection never drops a newer fetch installed under the same key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::error::{TrustError, TrustResult};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::types::FetchResult;

type SharedFetch = Shared<BoxFuture<'static, TrustResult<Arc<FetchResult>>>>;
type Slots = Arc<Mutex<HashMap<String, Slot>>>;

/// Identifies one fetch operation installed under a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

struct Slot {
    /// Distinguishes a slot from a later one installed under the same key.
    id: SlotId,
    fetch: SharedFetch,
}

/// Coalescing cache of fetch operations keyed by cache key.
pub struct FetchCache {
    fetcher: Arc<dyn Fetcher>,
    slots: Slots,
    next_id: AtomicU64,
}

impl std::fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl FetchCache {
    /// Create a cache over the given fetch capability.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Create a cache over a reqwest fetcher configured from the environment.
    pub fn from_env() -> TrustResult<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::from_env()?)))
    }

    /// The process-wide cache, created from the environment on first use.
    ///
    /// Every loader built with [`RemoteSvgLoader::from_env`] shares it, so a
    /// key is fetched at most once per process no matter how many loaders
    /// exist.
    ///
    /// [`RemoteSvgLoader::from_env`]: crate::RemoteSvgLoader::from_env
    pub fn global() -> TrustResult<Arc<FetchCache>> {
        static GLOBAL: OnceLock<Arc<FetchCache>> = OnceLock::new();
        if let Some(cache) = GLOBAL.get() {
            return Ok(Arc::clone(cache));
        }
        let cache = Arc::new(Self::from_env()?);
        Ok(Arc::clone(GLOBAL.get_or_init(|| cache)))
    }

    /// Fetch `locator`, sharing the operation with every other caller using
    /// `cache_key`.
    pub async fn fetch(&self, locator: &str, cache_key: &str) -> TrustResult<Arc<FetchResult>> {
        self.fetch_slot(locator, cache_key)
            .await
            .map(|(_, result)| result)
    }

    /// Like [`FetchCache::fetch`], also returning the slot the result came
    /// from for use with [`FetchCache::evict_slot`].
    pub async fn fetch_slot(
        &self,
        locator: &str,
        cache_key: &str,
    ) -> TrustResult<(SlotId, Arc<FetchResult>)> {
        let (id, fetch) = self.join_or_start(locator, cache_key);
        match fetch.await {
            Ok(result) => Ok((id, result)),
            Err(e) => {
                debug!(cache_key = %cache_key, error = %e, "fetch failed, dropping cache slot");
                remove_slot(&self.slots, cache_key, id);
                Err(e)
            }
        }
    }

    /// Remove the entry for `cache_key`, pending or not.
    pub fn evict(&self, cache_key: &str) {
        if lock(&self.slots).remove(cache_key).is_some() {
            debug!(cache_key = %cache_key, "evicted cache entry");
        }
    }

    /// Remove the entry for `cache_key` only if it is still `slot`.
    pub fn evict_slot(&self, cache_key: &str, slot: SlotId) {
        if remove_slot(&self.slots, cache_key, slot) {
            debug!(cache_key = %cache_key, "evicted cache entry");
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    /// Whether an entry (pending or finished) exists for `cache_key`.
    pub fn contains(&self, cache_key: &str) -> bool {
        lock(&self.slots).contains_key(cache_key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn join_or_start(&self, locator: &str, cache_key: &str) -> (SlotId, SharedFetch) {
        let mut slots = lock(&self.slots);

        if let Some(slot) = slots.get(cache_key) {
            debug!(cache_key = %cache_key, "joining cached fetch");
            return (slot.id, slot.fetch.clone());
        }

        let id = SlotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(cache_key = %cache_key, url = %locator, "starting fetch");

        let fetcher = Arc::clone(&self.fetcher);
        let task_slots = Arc::clone(&self.slots);
        let task_locator = locator.to_string();
        let task_key = cache_key.to_string();

        // The slot is inserted below while the lock is still held, so the
        // task's own removal on failure always finds it.
        let task = tokio::spawn(async move {
            let outcome = fetcher
                .fetch(&task_locator)
                .await
                .map(|response| Arc::new(FetchResult::from_response(&task_locator, response)));
            if outcome.is_err() {
                remove_slot(&task_slots, &task_key, id);
            }
            outcome
        });

        let fetch = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(TrustError::network(format!("fetch task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        slots.insert(
            cache_key.to_string(),
            Slot {
                id,
                fetch: fetch.clone(),
            },
        );

        (id, fetch)
    }
}

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<String, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remove_slot(slots: &Slots, cache_key: &str, id: SlotId) -> bool {
    let mut slots = lock(slots);
    if slots.get(cache_key).is_some_and(|slot| slot.id == id) {
        slots.remove(cache_key);
        return true;
    }
    false
}
