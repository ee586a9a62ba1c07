//! Configuration module for the Waypoint bot.
//!
//! Loads configuration from environment variables (and `.env`).

use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::router::DenialPolicy;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,

    /// Bot username (without @).
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Developer user IDs (comma-separated).
    /// These users pass developer-only routes and count as admins everywhere.
    pub developer_ids: HashSet<u64>,

    // Ingestion
    pub poll_timeout_secs: u32,
    pub backoff: Duration,
    pub max_concurrent_dispatches: usize,

    // Access
    pub denial_policy: DenialPolicy,
    pub admin_cache_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        // Parse bot username (strip @ if present)
        let bot_username = lookup("BOT_USERNAME")
            .map(|s| s.trim().trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        let developer_ids = parse_ids("DEV_IDS", &lookup("DEV_IDS").unwrap_or_default())?;

        let denial_policy = match lookup("DENIAL_POLICY")
            .unwrap_or_else(|| "silent".to_string())
            .to_lowercase()
            .as_str()
        {
            "silent" => DenialPolicy::Silent,
            "notify" => DenialPolicy::Notify,
            other => {
                return Err(ConfigError::Invalid {
                    name: "DENIAL_POLICY",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            bot_token,
            bot_username,
            developer_ids,
            poll_timeout_secs: parse_or("POLL_TIMEOUT_SECS", &lookup, 30)?,
            backoff: Duration::from_secs(parse_or("BACKOFF_SECS", &lookup, 5)?),
            max_concurrent_dispatches: parse_or("MAX_CONCURRENT_DISPATCHES", &lookup, 32)?,
            denial_policy,
            admin_cache_ttl: Duration::from_secs(parse_or("ADMIN_CACHE_TTL_SECS", &lookup, 300)?),
        })
    }
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_ids(name: &'static str, raw: &str) -> Result<HashSet<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name,
                value: s.to_string(),
            })
        })
        .collect()
}
