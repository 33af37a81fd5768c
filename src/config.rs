use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

pub const DEFAULT_API_BASE: &str = "http://api.amp.active.com/v2";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;
pub const DEFAULT_LOCATION: &str = "San Diego,CA,US";
pub const DEFAULT_RADIUS: u32 = 25;

/// Startup configuration, read from the environment exactly once.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub default_location: String,
    pub default_radius: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("ACTIVE_API_KEY")
            .map_err(|_| anyhow!("ACTIVE_API_KEY environment variable is required"))?;
        let api_base =
            env::var("ACTIVE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let cache_ttl = match env::var("CACHE_TTL_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse::<u64>()
                    .map_err(|e| anyhow!("invalid CACHE_TTL_SECS: {e}"))?,
            ),
            Err(_) => DEFAULT_CACHE_TTL,
        };
        let cache_max_entries = match env::var("CACHE_MAX_ENTRIES") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|e| anyhow!("invalid CACHE_MAX_ENTRIES: {e}"))?,
            Err(_) => DEFAULT_CACHE_MAX_ENTRIES,
        };
        let default_location =
            env::var("DEFAULT_LOCATION").unwrap_or_else(|_| DEFAULT_LOCATION.to_string());
        let default_radius = match env::var("DEFAULT_RADIUS") {
            Ok(v) => v
                .parse::<u32>()
                .map_err(|e| anyhow!("invalid DEFAULT_RADIUS: {e}"))?,
            Err(_) => DEFAULT_RADIUS,
        };

        Ok(Self {
            api_key,
            api_base,
            cache_ttl,
            cache_max_entries,
            default_location,
            default_radius,
        })
    }
}

#[cfg(test)]
impl Config {
    /// Test fixture pointing at a local fake upstream.
    pub fn for_tests(api_base: impl Into<String>) -> Self {
        Self {
            api_key: "test-key".into(),
            api_base: api_base.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            default_location: DEFAULT_LOCATION.into(),
            default_radius: DEFAULT_RADIUS,
        }
    }
}
