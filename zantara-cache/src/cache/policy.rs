//! Cacheability policy
//!
//! A request is cacheable only when all of the following hold:
//! - no parameter name contains a sensitive term (case-insensitive)
//! - the endpoint name contains no write-operation term (case-insensitive)
//! - the endpoint is on the whitelist (exact match)

use crate::key::RequestParams;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Parameter-name substrings that veto caching
pub const DEFAULT_SENSITIVE_TERMS: [&str; 6] =
    ["password", "token", "api_key", "secret", "auth", "credential"];

/// Endpoint-name substrings that mark a mutation
pub const DEFAULT_WRITE_TERMS: [&str; 6] = ["save", "create", "update", "delete", "upload", "send"];

/// TTL applied to whitelisted endpoints missing from the TTL table
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

const DEFAULT_ENDPOINT_TTLS: [(&str, Duration); 11] = [
    ("contact.info", Duration::from_secs(5 * 60)),
    ("team.list", Duration::from_secs(2 * 60)),
    ("team.departments", Duration::from_secs(5 * 60)),
    ("team.get", Duration::from_secs(2 * 60)),
    ("bali.zero.pricing", Duration::from_secs(10 * 60)),
    ("system.handlers.list", Duration::from_secs(10 * 60)),
    ("config.flags", Duration::from_secs(60)),
    ("dashboard.main", Duration::from_secs(30)),
    ("dashboard.health", Duration::from_secs(30)),
    ("memory.list", Duration::from_secs(2 * 60)),
    ("memory.entities", Duration::from_secs(2 * 60)),
];

/// Static policy tables deciding what may be cached and for how long
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Endpoints eligible for caching
    pub cacheable_endpoints: HashSet<String>,

    /// Per-endpoint TTL overrides
    pub endpoint_ttls: HashMap<String, Duration>,

    /// TTL for whitelisted endpoints absent from `endpoint_ttls`
    pub default_ttl: Duration,

    /// Lowercase substrings of parameter names that veto caching
    pub sensitive_terms: Vec<String>,

    /// Lowercase substrings of endpoint names that veto caching
    pub write_terms: Vec<String>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            cacheable_endpoints: DEFAULT_ENDPOINT_TTLS
                .iter()
                .map(|(endpoint, _)| endpoint.to_string())
                .collect(),
            endpoint_ttls: DEFAULT_ENDPOINT_TTLS
                .iter()
                .map(|(endpoint, ttl)| (endpoint.to_string(), *ttl))
                .collect(),
            default_ttl: DEFAULT_TTL,
            sensitive_terms: DEFAULT_SENSITIVE_TERMS.iter().map(|t| t.to_string()).collect(),
            write_terms: DEFAULT_WRITE_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl CachePolicy {
    /// Policy with default deny lists and an empty whitelist
    pub fn empty() -> Self {
        Self {
            cacheable_endpoints: HashSet::new(),
            endpoint_ttls: HashMap::new(),
            ..Default::default()
        }
    }

    /// Decide whether `(endpoint, params)` may be cached. Pure.
    pub fn is_cacheable(&self, endpoint: &str, params: &RequestParams) -> bool {
        !self.has_sensitive_params(params)
            && !self.is_write_operation(endpoint)
            && self.cacheable_endpoints.contains(endpoint)
    }

    /// Whether any parameter name contains a sensitive term
    pub fn has_sensitive_params(&self, params: &RequestParams) -> bool {
        params.keys().any(|key| {
            let key = key.to_lowercase();
            self.sensitive_terms.iter().any(|term| key.contains(term.as_str()))
        })
    }

    /// Whether the endpoint name looks like a mutation
    pub fn is_write_operation(&self, endpoint: &str) -> bool {
        let endpoint = endpoint.to_lowercase();
        self.write_terms.iter().any(|term| endpoint.contains(term.as_str()))
    }

    /// TTL for an endpoint, falling back to the default
    pub fn ttl_for(&self, endpoint: &str) -> Duration {
        self.endpoint_ttls
            .get(endpoint)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Whitelist an endpoint, optionally with its own TTL
    pub fn allow(&mut self, endpoint: impl Into<String>, ttl: Option<Duration>) {
        let endpoint = endpoint.into();
        match ttl {
            Some(ttl) => {
                self.endpoint_ttls.insert(endpoint.clone(), ttl);
            }
            None => {
                self.endpoint_ttls.remove(&endpoint);
            }
        }
        self.cacheable_endpoints.insert(endpoint);
    }

    /// Remove an endpoint from the whitelist. Returns whether it was listed.
    pub fn disallow(&mut self, endpoint: &str) -> bool {
        self.endpoint_ttls.remove(endpoint);
        self.cacheable_endpoints.remove(endpoint)
    }

    /// Lowercase deny-list terms so matching stays case-insensitive
    pub(crate) fn normalize(&mut self) {
        for term in self.sensitive_terms.iter_mut().chain(self.write_terms.iter_mut()) {
            *term = term.to_lowercase();
        }
    }
}
