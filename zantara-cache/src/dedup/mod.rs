//! # Request Deduplication
//!
//! Ensures at most one network request is in flight per `(endpoint, params)`.
//! Callers that arrive while a request is pending piggyback on it and receive
//! a clone of the same result.
//!
//! ## Example
//!
//! ```rust
//! use zantara_cache::dedup::RequestDeduplicator;
//! use zantara_cache::{RequestParams, TransportError};
//! use serde_json::{json, Value};
//!
//! # async fn example() {
//! let dedup: RequestDeduplicator<Value, TransportError> = RequestDeduplicator::default();
//! let params = RequestParams::new().with("id", 7);
//!
//! let first = dedup.deduplicate("team.get", &params, || async { Ok(json!({"name": "Amanda"})) });
//! let second = dedup.deduplicate("team.get", &params, || async { Ok(json!({"name": "other"})) });
//!
//! // Only the first request function runs
//! let (a, b) = futures::join!(first, second);
//! assert_eq!(a, b);
//! # }
//! ```

pub mod deduplicator;

pub use deduplicator::{
    DedupStats, DeduplicationConfig, PendingInfo, RequestDeduplicator, SharedRequestDeduplicator,
    SharedResponse,
};
