//! Environment-based configuration, read once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH: &str = "ipotracker.db";
pub const DEFAULT_BUCKET_DIR: &str = "ipo-bucket";
pub const DEFAULT_SOURCE_URL: &str = "https://www.iposcoop.com";
pub const DEFAULT_QUERY_ADDR: &str = "127.0.0.1:8080";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}

/// Settings shared by the collector, reconciler and query service.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// SQLite database file (`IPO_DATABASE_PATH`).
    pub database_path: PathBuf,
    /// Root directory of the blob bucket (`IPO_BUCKET_DIR`).
    pub bucket_dir: PathBuf,
    /// Site root of the listing pages (`IPO_SOURCE_URL`).
    pub source_url: String,
    /// Listen address of the query service (`IPO_QUERY_ADDR`).
    pub query_addr: SocketAddr,
    /// Delete upcoming records missing from the latest calendar (`IPO_REAP_UPCOMING`).
    pub reap_upcoming: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            bucket_dir: PathBuf::from(DEFAULT_BUCKET_DIR),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            query_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            reap_upcoming: false,
        }
    }
}

impl PipelineConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, falling back to
    /// defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("IPO_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("IPO_BUCKET_DIR") {
            config.bucket_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("IPO_SOURCE_URL") {
            config.source_url = url;
        }
        if let Some(addr) = lookup("IPO_QUERY_ADDR") {
            config.query_addr = addr.parse().map_err(|_| ConfigError::Invalid {
                key: "IPO_QUERY_ADDR".into(),
                value: addr.clone(),
            })?;
        }
        if let Some(flag) = lookup("IPO_REAP_UPCOMING") {
            config.reap_upcoming = parse_bool("IPO_REAP_UPCOMING", &flag)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
