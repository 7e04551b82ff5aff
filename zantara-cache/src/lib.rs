//! # Zantara Cache (zantara-cache)
//!
//! Client-side request optimization for the Zantara API: a TTL response cache
//! for idempotent endpoints and an in-flight request deduplicator.
//!
//! ## Features
//!
//! - Policy-gated response cache with per-endpoint TTL
//! - Canonical request keys that ignore parameter order
//! - Lazy and periodic expiry, with hit/miss/eviction statistics
//! - One network call per identical in-flight request, result shared by all waiters
//! - Dev-mode activity logging through `tracing`
//!
//! ## Response Cache
//!
//! ```rust
//! use zantara_cache::{CacheConfig, CacheManager, RequestParams};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheManager::new(CacheConfig::manual_cleanup());
//!     let params = RequestParams::new().with("department", "setup");
//!
//!     cache.set("team.list", &params, json!({"members": ["Amanda"]})).await;
//!     assert!(cache.get("team.list", &params).await.is_some());
//!
//!     // Write endpoints are never cached
//!     assert!(!cache.set("memory.save", &params, json!({"ok": true})).await);
//!     Ok(())
//! }
//! ```
//!
//! ## Cache + Deduplication
//!
//! ```rust
//! use zantara_cache::{ApiCaller, CacheConfig, DeduplicationConfig, RequestParams};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let caller: ApiCaller = ApiCaller::from_configs(
//!         CacheConfig::manual_cleanup(),
//!         DeduplicationConfig::default(),
//!     );
//!     let params = RequestParams::new();
//!
//!     let members = caller
//!         .call("team.list", &params, || async { Ok(json!(["Amanda", "Zainal"])) })
//!         .await?;
//!     println!("Members: {}", members);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod clock;
pub mod dedup;
pub mod error;
pub mod key;
pub mod logging;

// Re-export main types for convenience
pub use cache::{
    spawn_auto_cleanup, CacheConfig, CacheConfigBuilder, CacheEntry, CacheEntryInfo,
    CacheManager, CachePolicy, CacheStats, CleanupHandle, SharedCacheManager,
};
pub use client::ApiCaller;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use dedup::{
    DedupStats, DeduplicationConfig, PendingInfo, RequestDeduplicator, SharedRequestDeduplicator,
    SharedResponse,
};
pub use error::{CacheError, Result, TransportError};
pub use key::{RequestKey, RequestParams};
pub use logging::{detect_dev_mode, init_tracing};
