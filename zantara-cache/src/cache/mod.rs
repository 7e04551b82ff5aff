//! # Response Cache
//!
//! Stores successful responses of idempotent API calls for a per-endpoint
//! time-to-live, so repeated identical requests are served without a
//! network round trip.
//!
//! ## Features
//!
//! - **Policy-Gated**: only whitelisted endpoints are cached; write-like
//!   endpoint names and sensitive parameter names veto caching
//! - **Per-Endpoint TTL**: TTL table with a default fallback
//! - **Lazy + Periodic Expiry**: expired entries are dropped on read and by a
//!   background sweep owned through a [`CleanupHandle`]
//! - **Invalidation**: by exact request or by endpoint
//! - **Statistics**: hit/miss/set/eviction counters and per-entry snapshots
//!
//! ## Example
//!
//! ```rust
//! use zantara_cache::cache::{CacheConfig, CacheManager};
//! use zantara_cache::RequestParams;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CacheConfig::builder()
//!     .endpoint_ttl("team.list", Duration::from_secs(120))
//!     .build();
//!
//! let cache = CacheManager::new(config);
//! let params = RequestParams::new();
//!
//! cache.set("team.list", &params, json!({"members": []})).await;
//!
//! if let Some(members) = cache.get("team.list", &params).await {
//!     println!("Cache hit: {}", members);
//! }
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod policy;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use policy::CachePolicy;
pub use store::{spawn_auto_cleanup, CacheManager, CleanupHandle, SharedCacheManager};
pub use types::{CacheCounters, CacheEntryInfo, CacheStats};
