//! Cache manager: policy-gated storage with TTL expiry

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    policy::CachePolicy,
    types::{CacheCounters, CacheStats},
};
use crate::clock::{SharedClock, SystemClock};
use crate::error::Result;
use crate::key::{RequestKey, RequestParams};
use crate::logging::activity;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Shortest interval the background sweep will tick at
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(1);

/// Response cache for idempotent API calls
///
/// Every read and write is gated by the [`CachePolicy`]; requests that fail
/// the policy are neither stored nor counted. Expired entries are dropped
/// lazily on read and in bulk by [`CacheManager::cleanup`].
///
/// All state lives behind one lock, and no lock is held across an await.
pub struct CacheManager {
    config: CacheConfig,
    clock: SharedClock,
    store: RwLock<CacheStore>,
}

/// Internal cache storage
struct CacheStore {
    entries: HashMap<RequestKey, CacheEntry>,
    policy: CachePolicy,
    counters: CacheCounters,
    /// Bumped by every invalidation of an endpoint
    generations: HashMap<String, u64>,
    /// Bumped by `clear`
    epoch: u64,
}

impl CacheStore {
    fn generation(&self, endpoint: &str) -> u64 {
        self.epoch + self.generations.get(endpoint).copied().unwrap_or(0)
    }

    fn bump(&mut self, endpoint: &str) {
        *self.generations.entry(endpoint.to_string()).or_insert(0) += 1;
    }
}

/// Thread-safe handle to a cache manager
pub type SharedCacheManager = Arc<CacheManager>;

impl CacheManager {
    /// Create a cache manager reading the system clock.
    ///
    /// The configuration is taken as is; use [`CacheManager::try_new`] to
    /// reject one that fails [`CacheConfig::validate`].
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Validate the configuration, then create the manager
    pub fn try_new(config: CacheConfig) -> Result<Self> {
        Self::try_with_clock(config, Arc::new(SystemClock))
    }

    pub fn try_with_clock(config: CacheConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_clock(config, clock))
    }

    /// Create a cache manager with an explicit time source
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        let mut policy = config.policy.clone();
        policy.normalize();

        info!(
            "Initializing cache manager: {} cacheable endpoints, default TTL {:?}",
            policy.cacheable_endpoints.len(),
            policy.default_ttl
        );

        Self {
            config,
            clock,
            store: RwLock::new(CacheStore {
                entries: HashMap::new(),
                policy,
                counters: CacheCounters::default(),
                generations: HashMap::new(),
                epoch: 0,
            }),
        }
    }

    /// Create a shared cache manager
    pub fn shared(config: CacheConfig) -> SharedCacheManager {
        Arc::new(Self::new(config))
    }

    /// Configuration the manager was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current policy tables, including runtime changes
    pub async fn policy(&self) -> CachePolicy {
        self.store.read().await.policy.clone()
    }

    pub async fn is_cacheable(&self, endpoint: &str, params: &RequestParams) -> bool {
        self.store.read().await.policy.is_cacheable(endpoint, params)
    }

    pub async fn ttl_for(&self, endpoint: &str) -> Duration {
        self.store.read().await.policy.ttl_for(endpoint)
    }

    /// Look up a live cached response.
    ///
    /// Non-cacheable requests return `None` without touching the counters.
    /// An expired entry is removed and counted as both a miss and an eviction.
    pub async fn get(&self, endpoint: &str, params: &RequestParams) -> Option<Value> {
        let now = self.clock.now();
        let mut guard = self.store.write().await;
        let store = &mut *guard;

        if !store.policy.is_cacheable(endpoint, params) {
            return None;
        }

        let key = RequestKey::new(endpoint, params);

        match store.entries.get(&key).map(|entry| entry.is_expired(now)) {
            None => {
                store.counters.misses += 1;
                debug!("Cache miss: {}", key);
                None
            }
            Some(true) => {
                store.entries.remove(&key);
                store.counters.evictions += 1;
                store.counters.misses += 1;
                debug!("Cache entry expired: {}", key);
                None
            }
            Some(false) => {
                let entry = store.entries.get_mut(&key)?;
                entry.mark_accessed(now);
                store.counters.hits += 1;

                activity!(
                    self.config.dev_mode,
                    "Cache hit: {} (age: {}s, hits: {})",
                    endpoint,
                    entry.age(now).as_secs(),
                    entry.metadata.access_count
                );
                Some(entry.data.clone())
            }
        }
    }

    /// Store a response. Returns `false` (and stores nothing) if not cacheable.
    ///
    /// Any existing entry for the same key is replaced.
    pub async fn set(&self, endpoint: &str, params: &RequestParams, data: Value) -> bool {
        let mut guard = self.store.write().await;
        self.insert(&mut guard, endpoint, params, data)
    }

    /// Invalidation generation of an endpoint.
    ///
    /// Changes whenever the endpoint is invalidated, disallowed or the cache
    /// is cleared. Capture it before fetching and pass it to
    /// [`CacheManager::set_if_generation`].
    pub async fn generation(&self, endpoint: &str) -> u64 {
        self.store.read().await.generation(endpoint)
    }

    /// Store a response fetched at `generation`.
    ///
    /// Returns `false` without storing if the endpoint was invalidated since,
    /// so a response fetched before a write never lands after it.
    pub async fn set_if_generation(
        &self,
        endpoint: &str,
        params: &RequestParams,
        data: Value,
        generation: u64,
    ) -> bool {
        let mut guard = self.store.write().await;
        if guard.generation(endpoint) != generation {
            debug!("Endpoint invalidated during fetch, skipping store: {}", endpoint);
            return false;
        }
        self.insert(&mut guard, endpoint, params, data)
    }

    fn insert(&self, store: &mut CacheStore, endpoint: &str, params: &RequestParams, data: Value) -> bool {
        let now = self.clock.now();

        if !store.policy.is_cacheable(endpoint, params) {
            debug!("Not cacheable, skipping store: {}", endpoint);
            return false;
        }

        let ttl = store.policy.ttl_for(endpoint);
        let entry = CacheEntry::new(endpoint, params, data, ttl, now);
        store.entries.insert(entry.key.clone(), entry);
        store.counters.sets += 1;

        activity!(self.config.dev_mode, "Cache set: {} (TTL: {}s)", endpoint, ttl.as_secs());
        true
    }

    /// Whether a live entry exists, without touching counters or access metadata
    pub async fn contains(&self, endpoint: &str, params: &RequestParams) -> bool {
        let now = self.clock.now();
        let store = self.store.read().await;
        store
            .entries
            .get(&RequestKey::new(endpoint, params))
            .map_or(false, |entry| !entry.is_expired(now))
    }

    /// Remove entries for an endpoint.
    ///
    /// With `params`, removes that single entry (returns 0 or 1); without,
    /// removes every entry stored for the endpoint.
    pub async fn invalidate(&self, endpoint: &str, params: Option<&RequestParams>) -> usize {
        let mut store = self.store.write().await;
        store.bump(endpoint);

        let removed = match params {
            Some(params) => {
                let key = RequestKey::new(endpoint, params);
                usize::from(store.entries.remove(&key).is_some())
            }
            None => remove_endpoint(&mut store.entries, endpoint),
        };

        if removed > 0 {
            activity!(self.config.dev_mode, "Cache invalidated: {} ({} entries)", endpoint, removed);
        }
        removed
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.store.write().await;
        let store = &mut *guard;

        let before = store.entries.len();
        store.entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - store.entries.len();

        if evicted > 0 {
            store.counters.evictions += evicted as u64;
            activity!(self.config.dev_mode, "Cache cleanup: evicted {} expired entries", evicted);
        }
        evicted
    }

    /// Drop all entries. Counters are kept. Returns the number dropped.
    pub async fn clear(&self) -> usize {
        let mut store = self.store.write().await;
        let count = store.entries.len();
        store.entries.clear();
        store.epoch += 1;

        info!("Cleared {} entries from cache", count);
        count
    }

    /// Whitelist an endpoint at runtime, optionally with its own TTL
    pub async fn allow_endpoint(&self, endpoint: &str, ttl: Option<Duration>) {
        let mut store = self.store.write().await;
        store.policy.allow(endpoint, ttl);
        info!("Endpoint added to cache whitelist: {} (TTL: {:?})", endpoint, store.policy.ttl_for(endpoint));
    }

    /// Remove an endpoint from the whitelist and drop its entries.
    ///
    /// Returns whether the endpoint was whitelisted.
    pub async fn disallow_endpoint(&self, endpoint: &str) -> bool {
        let mut guard = self.store.write().await;
        let store = &mut *guard;

        let listed = store.policy.disallow(endpoint);
        store.bump(endpoint);
        let removed = remove_endpoint(&mut store.entries, endpoint);
        info!(
            "Endpoint removed from cache whitelist: {} ({} entries dropped)",
            endpoint, removed
        );
        listed
    }

    /// Counters plus a per-entry snapshot, sorted by key
    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let store = self.store.read().await;

        let mut entries: Vec<_> = store.entries.values().map(|entry| entry.info(now)).collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let counters = store.counters;
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            evictions: counters.evictions,
            hit_rate: counters.hit_rate(),
            size: store.entries.len(),
            entries,
        }
    }

    /// Number of stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }
}

fn remove_endpoint(entries: &mut HashMap<RequestKey, CacheEntry>, endpoint: &str) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.endpoint != endpoint);
    before - entries.len()
}

/// Owner of the background expiry sweep.
///
/// [`CleanupHandle::stop`] ends the task gracefully; dropping the handle
/// aborts it. The task also exits on its own once the cache is dropped.
#[derive(Debug)]
pub struct CleanupHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CleanupHandle {
    /// Signal the sweep to stop and wait for it to finish
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for CleanupHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start the periodic expiry sweep for `cache`.
///
/// Returns `None` when auto cleanup is disabled in the configuration.
/// Must be called from within a tokio runtime.
pub fn spawn_auto_cleanup(cache: &SharedCacheManager) -> Option<CleanupHandle> {
    if !cache.config.enable_auto_cleanup {
        debug!("Automatic cache cleanup disabled");
        return None;
    }

    let interval = cache.config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);
    let weak = Arc::downgrade(cache);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    info!("Starting automatic cache cleanup task (interval: {:?})", interval);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Cache cleanup task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(cache) = weak.upgrade() else {
                        debug!("Cache dropped, cleanup task exiting");
                        break;
                    };
                    let evicted = cache.cleanup().await;
                    if evicted > 0 {
                        debug!("Auto cleanup evicted {} entries", evicted);
                    }
                }
            }
        }
    });

    Some(CleanupHandle {
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}
