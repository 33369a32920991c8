use crate::error::{Result, TelebusError};
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Broker server configuration
    pub server: ServerConfig,
    /// Static asset configuration
    pub assets: AssetConfig,
    /// Descriptor catalog configuration
    pub catalog: CatalogConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 8080)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Root directory for dashboard assets (default: ./public)
    pub public_root: String,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Path to the command/channel descriptor catalog, empty = no catalog
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl LogConfig {
    /// Filter directive applied when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("telebus={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let port = get_env_or("TELEBUS_PORT", "8080").parse().map_err(|_| {
            TelebusError::InvalidConfig("TELEBUS_PORT must be a valid port number".into())
        })?;

        let catalog_path = get_env_or("TELEBUS_CATALOG", "");
        let catalog_path = if catalog_path.is_empty() {
            None
        } else {
            Some(catalog_path)
        };

        Ok(Config {
            server: ServerConfig {
                port,
                host: get_env_or("TELEBUS_HOST", "0.0.0.0"),
            },
            assets: AssetConfig {
                public_root: get_env_or("TELEBUS_PUBLIC_ROOT", "./public"),
            },
            catalog: CatalogConfig { path: catalog_path },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
