//! Cache module - typed caches over Moka.
//!
//! Used where a remote lookup is expensive and a slightly stale answer is
//! acceptable, such as chat admin checks.

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
