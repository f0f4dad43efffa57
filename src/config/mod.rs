//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Client configuration
    pub client: ClientConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| crate::Error::Config(format!("Failed to write config: {}", e)))
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Remote relay address (`host:port`)
    pub server: String,
    /// Shared passphrase with the remote relay
    pub password: String,
    /// Cipher method for the tunnel stream
    /// (`aes-256-gcm` or `chacha20-poly1305`)
    pub method: String,
    /// Local SOCKS5 proxy address
    pub socks5_listen: Option<String>,
    /// Local HTTP CONNECT proxy address
    pub http_listen: Option<String>,
    /// Append a random-length-hiding padding block to handshakes
    #[serde(default = "default_enable_padding")]
    pub enable_padding: bool,
    /// Maximum idle connections kept in the pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Connect timeout for new pool connections, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_enable_padding() -> bool {
    true
}

fn default_pool_size() -> usize {
    16
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", crate::DEFAULT_PORT),
            password: String::new(),
            method: "aes-256-gcm".to_string(),
            socks5_listen: Some("127.0.0.1:1080".to_string()),
            http_listen: Some("127.0.0.1:8080".to_string()),
            enable_padding: default_enable_padding(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [client]
            server = "relay.example.net:9633"
            password = "hunter2"
            method = "chacha20-poly1305"
            "#,
        )
        .unwrap();

        assert_eq!(config.client.server, "relay.example.net:9633");
        assert_eq!(config.client.method, "chacha20-poly1305");
        assert!(config.client.enable_padding);
        assert_eq!(config.client.pool_size, 16);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let restored: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(restored.client.server, config.client.server);
        assert_eq!(restored.client.method, config.client.method);
    }
}
