//! Statistics types for the cache manager

use serde::{Deserialize, Serialize};
use std::fmt;

/// Running counters kept by the cache manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    /// Reads served from the cache
    pub hits: u64,

    /// Cacheable reads that found nothing live
    pub misses: u64,

    /// Successful writes
    pub sets: u64,

    /// Entries removed because their TTL elapsed
    pub evictions: u64,
}

impl CacheCounters {
    /// Hit rate as a percentage, rounded to two decimals; 0 when nothing recorded
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            round2(self.hits as f64 / total as f64 * 100.0)
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Observability view of a single entry. Never used for policy decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub endpoint: String,
    /// Seconds since the entry was written
    pub age_secs: i64,
    /// Seconds until expiry (negative once expired but not yet swept)
    pub ttl_remaining_secs: i64,
    pub access_count: u64,
    /// Seconds since the last hit (or since the write)
    pub last_access_secs: i64,
}

/// Snapshot returned by `CacheManager::stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    /// Percentage, two decimals
    pub hit_rate: f64,
    /// Number of stored entries, including expired ones not yet swept
    pub size: usize,
    pub entries: Vec<CacheEntryInfo>,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, sets: {}, evictions: {}, hit_rate: {:.2}%, size: {} }}",
            self.hits, self.misses, self.sets, self.evictions, self.hit_rate, self.size
        )
    }
}
