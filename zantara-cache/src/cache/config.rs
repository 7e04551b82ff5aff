//! Configuration for the cache manager

use crate::cache::policy::CachePolicy;
use crate::error::{CacheError, Result};
use crate::logging::{self, parse_flag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Environment variable overriding the default TTL, in milliseconds
pub const DEFAULT_TTL_ENV: &str = "ZANTARA_CACHE_DEFAULT_TTL_MS";

/// Environment variable overriding the sweep interval, in milliseconds
pub const CLEANUP_INTERVAL_ENV: &str = "ZANTARA_CACHE_CLEANUP_INTERVAL_MS";

/// Environment variable enabling or disabling the background sweep
pub const AUTO_CLEANUP_ENV: &str = "ZANTARA_CACHE_AUTO_CLEANUP";

/// Configuration for the cache manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whitelist, TTL table and deny lists
    pub policy: CachePolicy,

    /// Run the periodic expiry sweep
    pub enable_auto_cleanup: bool,

    /// Interval between expiry sweeps
    pub cleanup_interval: Duration,

    /// Log cache activity at info level
    pub dev_mode: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::default(),
            enable_auto_cleanup: true,
            // Sweep once a minute
            cleanup_interval: Duration::from_secs(60),
            dev_mode: false,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Load configuration from the environment (and a `.env` file if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        let mut config = Self::from_vars(&vars)?;
        config.dev_mode = logging::detect_dev_mode();
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = vars.get(DEFAULT_TTL_ENV) {
            config.policy.default_ttl = Duration::from_millis(parse_millis(DEFAULT_TTL_ENV, ms)?);
        }

        if let Some(ms) = vars.get(CLEANUP_INTERVAL_ENV) {
            config.cleanup_interval = Duration::from_millis(parse_millis(CLEANUP_INTERVAL_ENV, ms)?);
        }

        if let Some(flag) = vars.get(AUTO_CLEANUP_ENV) {
            config.enable_auto_cleanup = parse_flag(flag).ok_or_else(|| {
                CacheError::ConfigError(format!("{} must be a boolean, got {:?}", AUTO_CLEANUP_ENV, flag))
            })?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.policy.default_ttl.is_zero() {
            return Err(CacheError::ConfigError(
                "default_ttl must be greater than 0".to_string(),
            ));
        }

        if let Some((endpoint, _)) = self.policy.endpoint_ttls.iter().find(|(_, ttl)| ttl.is_zero()) {
            return Err(CacheError::ConfigError(format!(
                "TTL for endpoint {} must be greater than 0",
                endpoint
            )));
        }

        if self.enable_auto_cleanup && self.cleanup_interval.is_zero() {
            return Err(CacheError::ConfigError(
                "cleanup_interval must be greater than 0 when auto cleanup is enabled".to_string(),
            ));
        }

        if self
            .policy
            .sensitive_terms
            .iter()
            .chain(self.policy.write_terms.iter())
            .any(|term| term.trim().is_empty())
        {
            // An empty term would match every name and veto all caching
            return Err(CacheError::ConfigError(
                "deny-list terms must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_millis(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        CacheError::ConfigError(format!("{} must be a whole number of milliseconds: {}", name, e))
    })
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    policy: Option<CachePolicy>,
    endpoints: Vec<(String, Option<Duration>)>,
    default_ttl: Option<Duration>,
    sensitive_terms: Option<Vec<String>>,
    write_terms: Option<Vec<String>>,
    enable_auto_cleanup: Option<bool>,
    cleanup_interval: Option<Duration>,
    dev_mode: Option<bool>,
}

impl CacheConfigBuilder {
    /// Start from a complete policy instead of the default tables
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Whitelist an endpoint with the default TTL
    pub fn cacheable_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push((endpoint.into(), None));
        self
    }

    /// Whitelist an endpoint with its own TTL
    pub fn endpoint_ttl(mut self, endpoint: impl Into<String>, ttl: Duration) -> Self {
        self.endpoints.push((endpoint.into(), Some(ttl)));
        self
    }

    /// Set the TTL used when an endpoint has no entry in the TTL table
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Replace the sensitive parameter terms
    pub fn sensitive_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_terms = Some(terms.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the write-operation terms
    pub fn write_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write_terms = Some(terms.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable the periodic sweep
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    /// Set the sweep interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    pub fn dev_mode(mut self, enable: bool) -> Self {
        self.dev_mode = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        let mut policy = self.policy.unwrap_or(defaults.policy);
        if let Some(ttl) = self.default_ttl {
            policy.default_ttl = ttl;
        }
        if let Some(terms) = self.sensitive_terms {
            policy.sensitive_terms = terms;
        }
        if let Some(terms) = self.write_terms {
            policy.write_terms = terms;
        }
        for (endpoint, ttl) in self.endpoints {
            policy.allow(endpoint, ttl);
        }
        policy.normalize();

        CacheConfig {
            policy,
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            dev_mode: self.dev_mode.unwrap_or(defaults.dev_mode),
        }
    }
}

/// Preset configurations
impl CacheConfig {
    /// Default tables with activity logged at info level
    pub fn development() -> Self {
        Self {
            dev_mode: true,
            ..Default::default()
        }
    }

    /// Default tables without the background sweep; expiry is lazy only
    pub fn manual_cleanup() -> Self {
        Self {
            enable_auto_cleanup: false,
            ..Default::default()
        }
    }
}
