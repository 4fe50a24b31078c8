//! Configuration module
//!
//! TOML-backed configuration for the proxy: listen address, blocklist,
//! outbound connect timeout and optional log file. Every field has a
//! default so a partial (or absent) config file works.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::timeout;

/// Default bind host
fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default listen port
fn default_port() -> u16 {
    8080
}

/// Default outbound connect timeout in seconds
fn default_connect_timeout_secs() -> u64 {
    timeout::CONNECT.as_secs()
}

/// Default blocklist: ad, tracking and video CDN hostnames
fn default_blocked_hosts() -> Vec<String> {
    [
        "www.youtube.com",
        "i.ytimg.com",
        "yt3.ggpht.com",
        "rr2---sn-j5caxoxu-i2o6.googlevideo.com",
        "fonts.googleapis.com",
        "fonts.gstatic.com",
        "play.google.com",
        "history.google.com",
        "encrypted-tbn0.gstatic.com",
        "www.gstatic.com",
        "jnn-pa.googleapis.com",
        "googleads.g.doubleclick.net",
        "static.doubleclick.net",
        "d.joinhoney.com",
        "cdn.honey.io",
        "mobile.events.data.microsoft.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Main proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Listener settings
    #[serde(default)]
    pub listener: ListenerConfig,
    /// Exact hostnames refused for CONNECT tunnels
    #[serde(default = "default_blocked_hosts")]
    pub blocked_hosts: Vec<String>,
    /// Outbound connect timeout in seconds; 0 disables the bound
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Optional file receiving a second copy of the log stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            blocked_hosts: default_blocked_hosts(),
            connect_timeout_secs: default_connect_timeout_secs(),
            log_file: None,
        }
    }
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Formatted listen address, e.g. `0.0.0.0:8080`.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }

    /// Outbound connect timeout, `None` when disabled.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

/// Load configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(config)
}

/// Create a configuration with all defaults.
#[must_use]
pub fn create_default_config() -> Config {
    Config::default()
}
