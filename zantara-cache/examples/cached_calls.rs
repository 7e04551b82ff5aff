//! Cached Calls Demo
//!
//! Fires bursts of identical calls at a simulated backend and shows how the
//! deduplicator and the response cache cut them down to single requests.
//!
//! Usage:
//!   cargo run --example cached_calls
//!
//! Environment variables:
//!   ZANTARA_DEV_MODE                  - log cache activity at info level
//!   ZANTARA_CACHE_DEFAULT_TTL_MS      - TTL for endpoints without their own
//!   ZANTARA_CACHE_CLEANUP_INTERVAL_MS - background sweep interval

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use zantara_cache::{
    init_tracing, spawn_auto_cleanup, ApiCaller, CacheConfig, CacheManager, DeduplicationConfig,
    RequestDeduplicator, RequestParams, TransportError,
};

/// Stand-in for the HTTP transport
#[derive(Clone, Default)]
struct SimulatedBackend {
    requests: Arc<AtomicUsize>,
}

impl SimulatedBackend {
    fn fetch(
        &self,
        endpoint: &str,
        params: &RequestParams,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<Value, TransportError>> {
        let requests = Arc::clone(&self.requests);
        let endpoint = endpoint.to_string();
        let params = params.canonical();

        move || {
            Box::pin(async move {
                let n = requests.fetch_add(1, Ordering::SeqCst) + 1;
                info!("Network request #{}: {} {}", n, endpoint, params);
                tokio::time::sleep(Duration::from_millis(100)).await;

                if endpoint == "dashboard.health" {
                    return Err(TransportError::Status {
                        status: 503,
                        message: "Service Unavailable".to_string(),
                    });
                }
                Ok(json!({"endpoint": endpoint, "request": n}))
            })
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cache_config = CacheConfig::from_env()?;
    init_tracing(cache_config.dev_mode);

    info!("=== Zantara Cache Demo ===");

    let cache = CacheManager::shared(cache_config);
    let cleanup = spawn_auto_cleanup(&cache);
    let dedup = Arc::new(RequestDeduplicator::new(DeduplicationConfig::from_env()));
    let caller = ApiCaller::new(cache, dedup);
    let backend = SimulatedBackend::default();

    info!("\n--- Burst of 5 identical team.list calls ---");
    let params = RequestParams::new().with("department", "setup");
    let burst: Vec<_> = (0..5)
        .map(|_| caller.call("team.list", &params, backend.fetch("team.list", &params)))
        .collect();
    for result in futures::future::join_all(burst).await {
        info!("Result: {}", result?);
    }
    info!("Network requests so far: {}", backend.requests());

    info!("\n--- Same call again, served from cache ---");
    let cached = caller
        .call("team.list", &params, backend.fetch("team.list", &params))
        .await?;
    info!("Result: {}", cached);
    info!("Network requests so far: {}", backend.requests());

    info!("\n--- Write endpoint, never cached ---");
    let note = RequestParams::new().with("title", "visa checklist");
    for _ in 0..2 {
        caller
            .call("memory.save", &note, backend.fetch("memory.save", &note))
            .await?;
    }
    info!("Network requests so far: {}", backend.requests());

    info!("\n--- Shared failure ---");
    let empty = RequestParams::new();
    let (a, b) = tokio::join!(
        caller.call("dashboard.health", &empty, backend.fetch("dashboard.health", &empty)),
        caller.call("dashboard.health", &empty, backend.fetch("dashboard.health", &empty)),
    );
    info!("First waiter: {:?}", a);
    info!("Second waiter: {:?}", b);

    info!("\n--- Invalidate and refetch ---");
    let removed = caller.invalidate("team.list", None).await;
    info!("Invalidated {} entries", removed);
    caller
        .call("team.list", &params, backend.fetch("team.list", &params))
        .await?;

    info!("\n--- Statistics ---");
    info!("{}", caller.cache().stats().await);
    let dedup_stats = caller.deduplicator().stats();
    info!(
        "Dedup: {} total, {} deduplicated ({:.2}%)",
        dedup_stats.total_requests, dedup_stats.deduplicated_requests, dedup_stats.deduplication_rate
    );
    info!("Network requests: {}", backend.requests());

    if let Some(cleanup) = cleanup {
        cleanup.stop().await;
    }

    info!("\n=== Demo Complete ===");
    Ok(())
}
