//! Configuration Management
//!
//! Configuration values are read from environment variables with sensible defaults.
//!
//! ## Configuration Variables
//!
//! - `DATABASE_URL`: SQLite connection string (default: `sqlite://coverage.db`)
//! - `BIND_ADDRESS`: HTTP server bind address (default: `0.0.0.0:8000`)
//! - `BADGE_BASE_URL`: Badge renderer prefix (default: `https://img.shields.io/badge/`)
//! - `LIST_LIMIT`: Default number of rows returned by listings (default: `50`)

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub badge_base_url: String,
    pub list_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://coverage.db".to_string(),
            bind_address: "0.0.0.0:8000".to_string(),
            badge_base_url: "https://img.shields.io/badge/".to_string(),
            list_limit: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Missing keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(address) = lookup("BIND_ADDRESS") {
            config.bind_address = address;
        }
        if let Some(base) = lookup("BADGE_BASE_URL") {
            config.badge_base_url = base;
        }
        if let Some(raw) = lookup("LIST_LIMIT") {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => config.list_limit = limit,
                _ => warn!(
                    value = raw.as_str(),
                    default = config.list_limit,
                    "Invalid LIST_LIMIT, using default"
                ),
            }
        }

        config
    }
}
