//! Cache entry with TTL and access metadata

use crate::cache::types::CacheEntryInfo;
use crate::clock::saturating_add;
use crate::key::{RequestKey, RequestParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A stored response plus the identity of the request that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Derived request key
    pub key: RequestKey,

    /// Cached response payload
    pub data: Value,

    /// Endpoint the response came from (used for bulk invalidation)
    pub endpoint: String,

    /// Parameters the response came from
    pub params: RequestParams,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create an entry written at `now` that lives for `ttl`.
    ///
    /// A TTL reaching past the representable date range never expires.
    pub fn new(
        endpoint: &str,
        params: &RequestParams,
        data: Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = saturating_add(now, ttl);

        Self {
            key: RequestKey::new(endpoint, params),
            data,
            endpoint: endpoint.to_string(),
            params: params.clone(),
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                expires_at,
                access_count: 0,
                ttl,
            },
        }
    }

    /// Expired strictly after `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.metadata.expires_at
    }

    /// Time left before expiry, `None` once expired
    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_expired(now) {
            None
        } else {
            (self.metadata.expires_at - now).to_std().ok()
        }
    }

    /// Record a cache hit
    pub fn mark_accessed(&mut self, now: DateTime<Utc>) {
        self.metadata.accessed_at = now;
        self.metadata.access_count += 1;
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.metadata.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    pub fn time_since_access(&self, now: DateTime<Utc>) -> Duration {
        (now - self.metadata.accessed_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Read-only snapshot for stats
    pub fn info(&self, now: DateTime<Utc>) -> CacheEntryInfo {
        CacheEntryInfo {
            key: self.key.to_string(),
            endpoint: self.endpoint.clone(),
            age_secs: whole_seconds(now - self.metadata.created_at),
            ttl_remaining_secs: whole_seconds(self.metadata.expires_at - now),
            access_count: self.metadata.access_count,
            last_access_secs: whole_seconds(now - self.metadata.accessed_at),
        }
    }
}

/// Round to the nearest whole second, keeping the sign
fn whole_seconds(d: chrono::Duration) -> i64 {
    (d.num_milliseconds() as f64 / 1000.0).round() as i64
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// Last successful read
    pub accessed_at: DateTime<Utc>,

    /// `created_at + ttl`
    pub expires_at: DateTime<Utc>,

    /// Number of cache hits served by this entry
    pub access_count: u64,

    /// TTL the entry was written with
    pub ttl: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_at(now: DateTime<Utc>, ttl: Duration) -> CacheEntry {
        CacheEntry::new(
            "team.list",
            &RequestParams::new(),
            json!({"members": ["Ari", "Dea"]}),
            ttl,
            now,
        )
    }

    #[test]
    fn test_cache_entry_creation() {
        let now = Utc::now();
        let entry = entry_at(now, Duration::from_secs(120));

        assert_eq!(entry.key.as_str(), "team.list:{}");
        assert_eq!(entry.endpoint, "team.list");
        assert_eq!(entry.metadata.access_count, 0);
        assert_eq!(entry.metadata.expires_at, now + chrono::Duration::seconds(120));
        assert!(!entry.is_expired(now));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let entry = entry_at(now, Duration::from_secs(10));
        let expires_at = entry.metadata.expires_at;

        assert!(!entry.is_expired(expires_at - chrono::Duration::milliseconds(1)));
        assert!(!entry.is_expired(expires_at));
        assert!(entry.is_expired(expires_at + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_unbounded_ttl_never_expires() {
        let now = Utc::now();

        let entry = entry_at(now, Duration::MAX);
        assert_eq!(entry.metadata.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!entry.is_expired(now + chrono::Duration::days(365 * 100)));

        // Representable as a delta, but past the end of the date range
        let entry = entry_at(now, Duration::from_millis(9_000_000_000_000_000));
        assert_eq!(entry.metadata.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(entry.info(now).ttl_remaining_secs > 0);
    }

    #[test]
    fn test_mark_accessed() {
        let now = Utc::now();
        let mut entry = entry_at(now, Duration::from_secs(60));

        let later = now + chrono::Duration::seconds(5);
        entry.mark_accessed(later);
        entry.mark_accessed(later);

        assert_eq!(entry.metadata.access_count, 2);
        assert_eq!(entry.metadata.accessed_at, later);
        assert_eq!(entry.time_since_access(later), Duration::from_secs(0));
        assert_eq!(entry.age(later), Duration::from_secs(5));
    }

    #[test]
    fn test_time_until_expiration() {
        let now = Utc::now();
        let entry = entry_at(now, Duration::from_secs(60));

        assert_eq!(entry.time_until_expiration(now), Some(Duration::from_secs(60)));
        assert_eq!(
            entry.time_until_expiration(now + chrono::Duration::seconds(61)),
            None
        );
    }

    #[test]
    fn test_info_snapshot() {
        let now = Utc::now();
        let mut entry = entry_at(now, Duration::from_secs(120));
        entry.mark_accessed(now + chrono::Duration::seconds(10));

        let info = entry.info(now + chrono::Duration::seconds(30));
        assert_eq!(info.endpoint, "team.list");
        assert_eq!(info.age_secs, 30);
        assert_eq!(info.ttl_remaining_secs, 90);
        assert_eq!(info.access_count, 1);
        assert_eq!(info.last_access_secs, 20);
    }
}
