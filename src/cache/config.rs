//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Entries are evicted this long after insertion.
    pub ttl: Option<Duration>,

    /// Entries are evicted if not read within this duration.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Chat role lookups: one entry per (chat, user), refreshed on `ttl`
    /// and dropped early when idle.
    pub fn chat_roles(ttl: Duration) -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(ttl),
            tti: Some(ttl.min(Duration::from_secs(120))), // 2 minutes idle at most
        }
    }
}
