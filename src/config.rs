//! Configuration management for the metalink server

use crate::error::{MetalinkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for the metalink server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP server binds to (default: "127.0.0.1:8080")
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Base URL of the repository host publishing `tetsudou.json`
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    /// Timeout for upstream metadata requests in seconds (default: 10)
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Where `GET /` redirects to
    #[serde(default = "default_homepage")]
    pub homepage: String,

    /// Value of the `generator` attribute in generated documents
    #[serde(default = "default_generator")]
    pub generator: String,

    /// Request header carrying the client's country code
    #[serde(default = "default_geo_header")]
    pub geo_header: String,

    /// `maxconnections` advertised to download clients (default: 1)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Metrics endpoint configuration (optional)
    #[serde(default)]
    pub metrics_endpoint: Option<MetricsEndpointConfig>,
}

/// Mirror selection tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectionConfig {
    /// Maximum number of mirrors advertised per response (default: unlimited)
    #[serde(default)]
    pub max_mirrors: Option<usize>,
}

/// Response cache for `GET /metalink`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds a response may be served from cache (default: 300)
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of cached responses (default: 1024)
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

/// Storage backing the mirror catalog
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatalogBackend {
    /// One JSON file per key below `path`
    Directory,
    /// Entries listed inline in the config file
    #[default]
    Memory,
}

/// Mirror catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: CatalogBackend,

    /// Root directory for the `directory` backend
    #[serde(default)]
    pub path: Option<String>,

    /// Raw values keyed by catalog key for the `memory` backend
    #[serde(default)]
    pub entries: HashMap<String, String>,
}

/// Configuration for the metrics HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsEndpointConfig {
    /// Whether to enable the metrics endpoint (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Address to bind the metrics endpoint to (default: "127.0.0.1:9090")
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsEndpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

// Default value functions for serde
fn default_listen_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_upstream_base_url() -> String {
    "https://repos.fyralabs.com".to_string()
}

fn default_upstream_timeout() -> u64 {
    10
}

fn default_homepage() -> String {
    "https://github.com/terrapkg/tetsudou".to_string()
}

fn default_generator() -> String {
    "tetsudou".to_string()
}

fn default_geo_header() -> String {
    "CF-IPCountry".to_string()
}

fn default_max_connections() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_cache_entries() -> usize {
    1024
}

fn default_metrics_address() -> String {
    "127.0.0.1:9090".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_address: default_listen_address(),
            upstream_base_url: default_upstream_base_url(),
            upstream_timeout_secs: default_upstream_timeout(),
            homepage: default_homepage(),
            generator: default_generator(),
            geo_header: default_geo_header(),
            max_connections: default_max_connections(),
            selection: SelectionConfig::default(),
            cache: CacheConfig::default(),
            catalog: CatalogConfig::default(),
            metrics_endpoint: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Returns
    /// * `Ok(ServerConfig)` if loading and validation succeed
    /// * `Err(MetalinkError)` if file cannot be read or config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            MetalinkError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(content).map_err(|e| {
            MetalinkError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - listen_address must be a socket address
    /// - upstream_base_url must be an http(s) URL
    /// - upstream_timeout_secs and max_connections must be > 0
    /// - selection.max_mirrors must be > 0 when set
    /// - cache ttl and capacity must be > 0 when caching is enabled
    /// - the directory catalog backend requires a path
    pub fn validate(&self) -> Result<()> {
        self.listen_address
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                MetalinkError::ConfigError(format!(
                    "Invalid listen_address '{}': {}",
                    self.listen_address, e
                ))
            })?;

        let upstream = url::Url::parse(&self.upstream_base_url).map_err(|e| {
            MetalinkError::ConfigError(format!(
                "Invalid upstream_base_url '{}': {}",
                self.upstream_base_url, e
            ))
        })?;
        if !matches!(upstream.scheme(), "http" | "https") {
            return Err(MetalinkError::ConfigError(format!(
                "upstream_base_url must use http or https, got '{}'",
                upstream.scheme()
            )));
        }

        if self.upstream_timeout_secs == 0 {
            return Err(MetalinkError::ConfigError(
                "upstream_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(MetalinkError::ConfigError(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.geo_header.is_empty() {
            return Err(MetalinkError::ConfigError(
                "geo_header must not be empty".to_string(),
            ));
        }

        if self.selection.max_mirrors == Some(0) {
            return Err(MetalinkError::ConfigError(
                "selection.max_mirrors must be greater than 0 when set".to_string(),
            ));
        }

        if self.cache.enabled {
            if self.cache.ttl_secs == 0 {
                return Err(MetalinkError::ConfigError(
                    "cache.ttl_secs must be greater than 0 when caching is enabled".to_string(),
                ));
            }
            if self.cache.max_entries == 0 {
                return Err(MetalinkError::ConfigError(
                    "cache.max_entries must be greater than 0 when caching is enabled"
                        .to_string(),
                ));
            }
        }

        if self.catalog.backend == CatalogBackend::Directory
            && self.catalog.path.as_deref().map_or(true, str::is_empty)
        {
            return Err(MetalinkError::ConfigError(
                "catalog.path is required when catalog.backend is 'directory'".to_string(),
            ));
        }

        if let Some(ref metrics) = self.metrics_endpoint {
            if metrics.enabled {
                metrics.address.parse::<std::net::SocketAddr>().map_err(|e| {
                    MetalinkError::ConfigError(format!(
                        "Invalid metrics_endpoint.address '{}': {}",
                        metrics.address, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}
