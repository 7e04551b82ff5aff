//! Cache-then-deduplicate call path
//!
//! [`ApiCaller`] wires the response cache in front of the deduplicator, the
//! way an API client uses them: a live cached response short-circuits the
//! call, otherwise concurrent identical calls share one request whose
//! successful result is written back to the cache.

use crate::cache::{CacheConfig, CacheManager, SharedCacheManager};
use crate::dedup::{DeduplicationConfig, RequestDeduplicator, SharedRequestDeduplicator};
use crate::error::TransportError;
use crate::key::RequestParams;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Front door for idempotent API calls
pub struct ApiCaller<E = TransportError> {
    cache: SharedCacheManager,
    dedup: SharedRequestDeduplicator<Value, E>,
}

impl<E> Clone for ApiCaller<E> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            dedup: Arc::clone(&self.dedup),
        }
    }
}

impl<E> ApiCaller<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new(cache: SharedCacheManager, dedup: SharedRequestDeduplicator<Value, E>) -> Self {
        Self { cache, dedup }
    }

    /// Build both components from their configurations
    pub fn from_configs(cache: CacheConfig, dedup: DeduplicationConfig) -> Self {
        Self::new(
            CacheManager::shared(cache),
            Arc::new(RequestDeduplicator::new(dedup)),
        )
    }

    pub fn cache(&self) -> &SharedCacheManager {
        &self.cache
    }

    pub fn deduplicator(&self) -> &SharedRequestDeduplicator<Value, E> {
        &self.dedup
    }

    /// Serve `(endpoint, params)` from the cache or through one shared request.
    ///
    /// Only a successful result is written to the cache; errors reach every
    /// waiter and leave nothing behind. A result is not written back if the
    /// endpoint was invalidated while the request was in flight.
    pub async fn call<F, Fut>(
        &self,
        endpoint: &str,
        params: &RequestParams,
        request_fn: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
    {
        if let Some(data) = self.cache.get(endpoint, params).await {
            return Ok(data);
        }

        let cache = Arc::clone(&self.cache);
        let owned_endpoint = endpoint.to_string();
        let owned_params = params.clone();

        self.dedup
            .deduplicate(endpoint, params, move || async move {
                let generation = cache.generation(&owned_endpoint).await;
                let result = request_fn().await;
                if let Ok(data) = &result {
                    if cache
                        .set_if_generation(&owned_endpoint, &owned_params, data.clone(), generation)
                        .await
                    {
                        debug!("Stored response for {}", owned_endpoint);
                    }
                }
                result
            })
            .await
    }

    /// Forget cached responses and pending registrations for an endpoint.
    ///
    /// Requests already in flight still answer their waiters but no longer
    /// write their result to the cache. Returns the number of cache entries
    /// removed.
    pub async fn invalidate(&self, endpoint: &str, params: Option<&RequestParams>) -> usize {
        self.dedup.cancel(endpoint, params);
        self.cache.invalidate(endpoint, params).await
    }
}
