//! Request deduplication
//!
//! When several identical requests are issued while the first one is still in
//! flight, only the first one reaches the network. Every caller awaits the same
//! shared future and observes the same success or the same error.

use crate::cache::types::round2;
use crate::clock::{SharedClock, SystemClock};
use crate::error::TransportError;
use crate::key::{RequestKey, RequestParams};
use crate::logging::{self, activity};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info};

/// Configuration for request deduplication
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    /// Whether deduplication is enabled; when off every call goes to the network
    pub enabled: bool,
    /// Log reuse and cancellation at info level
    pub dev_mode: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dev_mode: false,
        }
    }
}

impl DeduplicationConfig {
    /// Default configuration with dev mode detected from the environment
    pub fn from_env() -> Self {
        Self {
            dev_mode: logging::detect_dev_mode(),
            ..Default::default()
        }
    }
}

/// Future shared by every caller of one in-flight request
pub type SharedResponse<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Bookkeeping for one in-flight request.
///
/// Only a weak handle is kept: the call is driven by its waiters, and the
/// registry never keeps an abandoned call alive.
struct PendingRequest<T, E> {
    id: u64,
    endpoint: String,
    started_at: DateTime<Utc>,
    response: WeakShared<BoxFuture<'static, Result<T, E>>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct DedupCounters {
    total_requests: u64,
    deduplicated_requests: u64,
    unique_requests: u64,
}

struct Registry<T, E> {
    pending: HashMap<RequestKey, PendingRequest<T, E>>,
    next_id: u64,
    counters: DedupCounters,
}

type SharedRegistry<T, E> = Arc<Mutex<Registry<T, E>>>;

fn lock<T, E>(registry: &SharedRegistry<T, E>) -> MutexGuard<'_, Registry<T, E>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes its registration when the request settles or is abandoned.
///
/// A registration replaced after `cancel` carries a different id and is left alone.
struct CompletionGuard<T, E> {
    registry: Weak<Mutex<Registry<T, E>>>,
    key: RequestKey,
    id: u64,
}

impl<T, E> Drop for CompletionGuard<T, E> {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if registry.pending.get(&self.key).map_or(false, |p| p.id == self.id) {
            registry.pending.remove(&self.key);
            debug!("Request settled, unregistered: {}", self.key);
        }
    }
}

/// Collapses concurrent identical requests into one network call
///
/// `T` is the response payload and `E` the transport error; both are cloned
/// out to every waiter.
pub struct RequestDeduplicator<T = Value, E = TransportError> {
    registry: SharedRegistry<T, E>,
    clock: SharedClock,
    config: DeduplicationConfig,
}

/// Thread-safe handle to a deduplicator
pub type SharedRequestDeduplicator<T = Value, E = TransportError> = Arc<RequestDeduplicator<T, E>>;

impl<T, E> Default for RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DeduplicationConfig::default())
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(config: DeduplicationConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: DeduplicationConfig, clock: SharedClock) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                pending: HashMap::new(),
                next_id: 0,
                counters: DedupCounters::default(),
            })),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    /// Join the in-flight request for `(endpoint, params)` or start a new one.
    ///
    /// Registration happens synchronously inside this call, before anything is
    /// awaited, so a second caller arriving before the first call resolves
    /// always finds the pending entry. `request_fn` runs at most once per
    /// registration, on the first poll of the returned future. The
    /// registration is removed as soon as the call settles, success or error,
    /// so the next call after a failure starts a fresh attempt.
    pub fn deduplicate<F, Fut>(
        &self,
        endpoint: &str,
        params: &RequestParams,
        request_fn: F,
    ) -> SharedResponse<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = RequestKey::new(endpoint, params);
        let mut guard = lock(&self.registry);
        let registry = &mut *guard;
        registry.counters.total_requests += 1;

        if !self.config.enabled {
            registry.counters.unique_requests += 1;
            return async move { request_fn().await }.boxed().shared();
        }

        if let Some(response) = registry
            .pending
            .get(&key)
            .and_then(|pending| pending.response.upgrade())
        {
            registry.counters.deduplicated_requests += 1;
            activity!(self.config.dev_mode, "Reusing pending request: {}", endpoint);
            return response;
        }

        registry.counters.unique_requests += 1;
        let id = registry.next_id;
        registry.next_id += 1;

        let completion = CompletionGuard {
            registry: Arc::downgrade(&self.registry),
            key: key.clone(),
            id,
        };
        let response = async move {
            let result = request_fn().await;
            // Unregister before waiters see the result
            drop(completion);
            result
        }
        .boxed()
        .shared();

        if let Some(weak) = response.downgrade() {
            registry.pending.insert(
                key,
                PendingRequest {
                    id,
                    endpoint: endpoint.to_string(),
                    started_at: self.clock.now(),
                    response: weak,
                },
            );
        }

        activity!(self.config.dev_mode, "New request: {}", endpoint);
        response
    }

    /// Drop pending registrations for an endpoint.
    ///
    /// Only the bookkeeping is removed: calls already in flight still finish
    /// and their waiters still get the result, but the next identical call
    /// starts a fresh request. With `params`, removes that single
    /// registration (returns 0 or 1).
    pub fn cancel(&self, endpoint: &str, params: Option<&RequestParams>) -> usize {
        let mut registry = lock(&self.registry);

        let removed = match params {
            Some(params) => {
                let key = RequestKey::new(endpoint, params);
                usize::from(registry.pending.remove(&key).is_some())
            }
            None => {
                let before = registry.pending.len();
                registry.pending.retain(|key, _| !key.belongs_to(endpoint));
                before - registry.pending.len()
            }
        };

        if removed > 0 {
            activity!(self.config.dev_mode, "Cancelled {} pending requests for {}", removed, endpoint);
        }
        removed
    }

    /// Drop all pending registrations (bookkeeping only, as with `cancel`)
    pub fn clear(&self) -> usize {
        let mut registry = lock(&self.registry);
        let count = registry.pending.len();
        registry.pending.clear();

        info!("Cleared {} pending requests", count);
        count
    }

    pub fn is_pending(&self, endpoint: &str, params: &RequestParams) -> bool {
        lock(&self.registry)
            .pending
            .contains_key(&RequestKey::new(endpoint, params))
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.registry).pending.len()
    }

    /// Per-request view of what is in flight, sorted by key
    pub fn pending_details(&self) -> Vec<PendingInfo> {
        let now = self.clock.now();
        let registry = lock(&self.registry);

        let mut details: Vec<PendingInfo> = registry
            .pending
            .iter()
            .map(|(key, pending)| PendingInfo {
                key: key.to_string(),
                endpoint: pending.endpoint.clone(),
                started_at: pending.started_at,
                elapsed_ms: (now - pending.started_at).num_milliseconds().max(0),
            })
            .collect();
        details.sort_by(|a, b| a.key.cmp(&b.key));
        details
    }

    /// Get statistics about deduplication
    pub fn stats(&self) -> DedupStats {
        let registry = lock(&self.registry);
        let counters = registry.counters;

        let deduplication_rate = if counters.total_requests > 0 {
            round2(counters.deduplicated_requests as f64 / counters.total_requests as f64 * 100.0)
        } else {
            0.0
        };

        let mut pending_requests: Vec<String> =
            registry.pending.keys().map(|key| key.to_string()).collect();
        pending_requests.sort();

        DedupStats {
            total_requests: counters.total_requests,
            deduplicated_requests: counters.deduplicated_requests,
            unique_requests: counters.unique_requests,
            deduplication_rate,
            pending_count: pending_requests.len(),
            pending_requests,
        }
    }
}

/// Statistics for request deduplication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupStats {
    pub total_requests: u64,
    /// Calls that joined an in-flight request
    pub deduplicated_requests: u64,
    /// Calls that started a request
    pub unique_requests: u64,
    /// Percentage, two decimals
    pub deduplication_rate: f64,
    pub pending_count: usize,
    pub pending_requests: Vec<String>,
}

/// One in-flight request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    pub key: String,
    pub endpoint: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    type Dedup = RequestDeduplicator<Value, TransportError>;

    #[tokio::test]
    async fn test_request_deduplication() {
        let dedup = Dedup::default();
        let execution_count = Arc::new(AtomicUsize::new(0));
        let params = RequestParams::new().with("x", 1);

        let mut calls = Vec::new();
        for _ in 0..5 {
            let execution_count = execution_count.clone();
            calls.push(dedup.deduplicate("E", &params, move || async move {
                execution_count.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(json!({"ok": true}))
            }));
        }

        let results = futures::future::join_all(calls).await;

        assert_eq!(execution_count.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &Ok(json!({"ok": true}))));

        let stats = dedup.stats();
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.unique_requests, 1);
        assert_eq!(stats.deduplicated_requests, 4);
        assert_eq!(stats.deduplication_rate, 80.0);
        assert_eq!(stats.pending_count, 0);
    }

    #[tokio::test]
    async fn test_different_keys_not_deduplicated() {
        let dedup = Dedup::default();
        let execution_count = Arc::new(AtomicUsize::new(0));

        let count1 = execution_count.clone();
        let count2 = execution_count.clone();
        let first = dedup.deduplicate("team.get", &RequestParams::new().with("id", 1), move || async move {
            count1.fetch_add(1, Ordering::SeqCst);
            Ok(json!(1))
        });
        let second = dedup.deduplicate("team.get", &RequestParams::new().with("id", 2), move || async move {
            count2.fetch_add(1, Ordering::SeqCst);
            Ok(json!(2))
        });

        assert_eq!(first.await, Ok(json!(1)));
        assert_eq!(second.await, Ok(json!(2)));
        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_registration_is_synchronous() {
        let dedup = Dedup::default();
        let params = RequestParams::new();
        let (tx, rx) = oneshot::channel::<()>();

        let _pending = dedup.deduplicate("team.list", &params, move || async move {
            let _ = rx.await;
            Ok(json!(null))
        });

        // Nothing has been polled yet, the entry is already visible
        assert!(dedup.is_pending("team.list", &params));
        assert_eq!(dedup.pending_count(), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_abandoned_request_unregisters() {
        let dedup = Dedup::default();
        let params = RequestParams::new();

        let pending = dedup.deduplicate("team.list", &params, || async { Ok(json!(1)) });
        assert!(dedup.is_pending("team.list", &params));

        drop(pending);
        assert!(!dedup.is_pending("team.list", &params));
    }

    #[tokio::test]
    async fn test_disabled_runs_every_call() {
        let dedup = Dedup::new(DeduplicationConfig {
            enabled: false,
            ..Default::default()
        });
        let execution_count = Arc::new(AtomicUsize::new(0));
        let params = RequestParams::new();

        let make = |count: Arc<AtomicUsize>| {
            move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(json!(1))
            }
        };
        let a = dedup.deduplicate("E", &params, make(execution_count.clone()));
        let b = dedup.deduplicate("E", &params, make(execution_count.clone()));
        let _ = futures::join!(a, b);

        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
        assert_eq!(dedup.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_details() {
        let dedup = Dedup::default();
        let (_tx, rx) = oneshot::channel::<()>();
        let _pending = dedup.deduplicate("team.list", &RequestParams::new(), move || async move {
            let _ = rx.await;
            Ok(json!(null))
        });

        let details = dedup.pending_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].endpoint, "team.list");
        assert_eq!(details[0].key, "team.list:{}");
        assert!(details[0].elapsed_ms >= 0);
    }

    #[test]
    fn test_empty_stats() {
        let stats = Dedup::default().stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.deduplication_rate, 0.0);
        assert!(stats.pending_requests.is_empty());
    }
}
