//! Configuration Module
//!
//! Loads cache, repository and server settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::repository::Invalidation;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Total number of cached reads held across all shards
    pub cache_capacity: usize,
    /// Number of independently locked cache shards, each with its own recency
    pub cache_shards: usize,
    /// TTL in seconds of cached reads
    pub read_ttl: u64,
    /// Deadline in milliseconds for every backing-store call
    pub query_timeout_ms: u64,
    /// Whether writes drop the cached reads they make stale
    pub invalidate_on_write: bool,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cached reads (default: 1000)
    /// - `CACHE_SHARDS` - Cache shard count (default: 1). With more than one
    ///   shard, LRU order is strict only within a shard: a full shard evicts
    ///   its own oldest read even while other shards have room
    /// - `READ_TTL` - TTL of cached reads in seconds (default: 600)
    /// - `QUERY_TIMEOUT_MS` - Store call deadline in milliseconds (default: 5000)
    /// - `INVALIDATE_ON_WRITE` - Drop stale reads on write (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |name: &str| lookup(name).map(|v| v.trim().to_string());

        Self {
            cache_capacity: parsed(parse("CACHE_CAPACITY"), defaults.cache_capacity),
            cache_shards: parsed(parse("CACHE_SHARDS"), defaults.cache_shards),
            read_ttl: parsed(parse("READ_TTL"), defaults.read_ttl),
            query_timeout_ms: parsed(parse("QUERY_TIMEOUT_MS"), defaults.query_timeout_ms),
            invalidate_on_write: parse("INVALIDATE_ON_WRITE")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.invalidate_on_write),
            server_port: parsed(parse("SERVER_PORT"), defaults.server_port),
        }
    }

    /// Rejects settings no cache or repository can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(StoreError::Configuration(
                "CACHE_CAPACITY must be greater than zero".to_string(),
            ));
        }
        if self.cache_shards == 0 {
            return Err(StoreError::Configuration(
                "CACHE_SHARDS must be greater than zero".to_string(),
            ));
        }
        if self.query_timeout_ms == 0 {
            return Err(StoreError::Configuration(
                "QUERY_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_ttl(&self) -> Duration {
        Duration::from_secs(self.read_ttl)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn invalidation(&self) -> Invalidation {
        if self.invalidate_on_write {
            Invalidation::ByIdentity
        } else {
            Invalidation::Disabled
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            cache_shards: 1,
            read_ttl: 600,
            query_timeout_ms: 5000,
            invalidate_on_write: true,
            server_port: 3000,
        }
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
