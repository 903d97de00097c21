//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::sim::DEFAULT_SNAPSHOT_INTERVAL;
use crate::game::sync::Role;

/// Peer configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// host (authority) or guest (mirror)
    pub role: Role,
    /// HTTP binding address (websocket endpoint on the host, debug surface on both)
    pub server_addr: SocketAddr,
    /// Host websocket URL, guest only
    pub host_url: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Level index loaded at startup
    pub start_level: usize,
    /// Ticks between authoritative snapshots
    pub snapshot_interval: u32,
    /// Seed for enemy cadence randomness
    pub sim_seed: u64,
    /// JSON file of input frames replayed by a headless peer
    pub input_script: Option<PathBuf>,

    /// Allowed client origins for CORS
    pub client_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let role = match lookup("PEER_ROLE") {
            Some(raw) => Role::from_str(&raw).map_err(|_| ConfigError::InvalidRole(raw))?,
            None => Role::Authority,
        };

        // PORT wins over SERVER_ADDR when a platform assigns one
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let host_url = lookup("HOST_URL");
        if !role.is_authority() && host_url.is_none() {
            return Err(ConfigError::Missing("HOST_URL"));
        }

        let snapshot_interval = parse_or(&lookup, "SNAPSHOT_INTERVAL", DEFAULT_SNAPSHOT_INTERVAL)?;
        if snapshot_interval == 0 {
            return Err(ConfigError::Invalid {
                key: "SNAPSHOT_INTERVAL",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            role,
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            host_url,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            start_level: parse_or(&lookup, "START_LEVEL", 0)?,
            snapshot_interval,
            sim_seed: parse_or(&lookup, "SIM_SEED", 0)?,
            input_script: lookup("INPUT_SCRIPT").map(PathBuf::from),

            client_origins: lookup("CLIENT_ORIGIN")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Unknown peer role: {0}")]
    InvalidRole(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
