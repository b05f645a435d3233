//! Configuration management for noticeflow
//!
//! Configuration is read from `./config/noticeflow.toml` when present. Every
//! key has a default, so a missing file or a partial file is fine; the
//! commented template written by `--init` documents those defaults.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/noticeflow.toml";

/// Default configuration template
pub const DEFAULT_CONFIG: &str = include_str!("../config/noticeflow.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Invalid address in '{field}': {address} (expected ip:port format)")]
    InvalidAddress { field: String, address: String },

    #[error("Configuration field '{field}' cannot be empty or zero")]
    EmptyRequired { field: String },
}

/// Root configuration passed into the pipeline entry point
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub aggregate: AggregateConfig,
}

/// HTTP client configuration for remote document fetches
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Direct-download endpoint that shared-drive links are rewritten to
    #[serde(default = "default_drive_download_base")]
    pub drive_download_base: String,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; noticeflow/0.1)".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_drive_download_base() -> String {
    "https://drive.google.com/uc".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            drive_download_base: default_drive_download_base(),
        }
    }
}

/// Name resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Maximum concurrent lookups
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-lookup timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Explicit nameservers; empty means the system configuration
    #[serde(default)]
    pub nameservers: Vec<NameServerEntry>,
}

fn default_workers() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_ms: default_timeout_ms(),
            nameservers: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Traditional DNS server
#[derive(Debug, Clone, Deserialize)]
pub struct NameServerEntry {
    pub name: String,
    pub address: String,
}

/// Sizes of the summary tables
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateConfig {
    #[serde(default = "default_top_small")]
    pub top_principals: usize,
    #[serde(default = "default_top_large")]
    pub top_domains: usize,
    #[serde(default = "default_top_small")]
    pub top_recipients: usize,
    #[serde(default = "default_top_large")]
    pub top_ip_groups: usize,
    #[serde(default = "default_recent_months")]
    pub recent_months: usize,
}

fn default_top_small() -> usize {
    5
}

fn default_top_large() -> usize {
    10
}

fn default_recent_months() -> usize {
    12
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            top_principals: default_top_small(),
            top_domains: default_top_large(),
            top_recipients: default_top_small(),
            top_ip_groups: default_top_large(),
            recent_months: default_recent_months(),
        }
    }
}

impl PipelineConfig {
    /// Load from the default path, falling back to defaults when no file exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::load_from_path(Path::new(CONFIG_PATH)) {
            Err(ConfigError::FileNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if !self.http.drive_download_base.starts_with("http://")
            && !self.http.drive_download_base.starts_with("https://")
        {
            return Err(ConfigError::InvalidUrl {
                field: "http.drive_download_base".to_string(),
                url: self.http.drive_download_base.clone(),
            });
        }

        if self.resolver.workers == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "resolver.workers".to_string(),
            });
        }

        for (i, server) in self.resolver.nameservers.iter().enumerate() {
            if server.address.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::InvalidAddress {
                    field: format!("resolver.nameservers[{}].address", i),
                    address: server.address.clone(),
                });
            }
        }

        Ok(())
    }

    /// Write the default configuration template to the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}
