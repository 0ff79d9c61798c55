//! Optional TOML configuration file.
//!
//! # What is TOML? (for beginners)
//!
//! TOML is a small configuration format that maps directly onto Rust structs
//! through `serde`.  A complete padlink config looks like:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8000
//! ping_interval_secs = 5       # how often each phone is pinged
//! liveness_timeout_secs = 15   # silence after which a phone is dropped
//!
//! [layouts]
//! path = "layouts.json"
//!
//! [device]
//! kind = "uinput"       # or "log"
//! name = "padlink-keyboard"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` take the value of `some_fn()` when absent,
//! so an empty file is a valid config.
//!
//! Precedence is resolved in `main.rs`: CLI flag / environment variable,
//! then this file, then [`HostConfig::default`].

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DeviceKind, HostConfig, InvalidLiveness};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    /// The ping and liveness settings cannot detect a dead phone.
    #[error(transparent)]
    Liveness(#[from] InvalidLiveness),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub layouts: LayoutsSection,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` accepts phones on the LAN.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutsSection {
    #[serde(default = "default_layouts_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    #[serde(default = "DeviceKind::platform_default")]
    pub kind: DeviceKind,
    #[serde(default = "default_device_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_ping_interval_secs() -> u64 {
    5
}
fn default_liveness_timeout_secs() -> u64 {
    15
}
fn default_layouts_path() -> PathBuf {
    PathBuf::from("layouts.json")
}
fn default_device_name() -> String {
    "padlink-keyboard".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            ping_interval_secs: default_ping_interval_secs(),
            liveness_timeout_secs: default_liveness_timeout_secs(),
        }
    }
}

impl Default for LayoutsSection {
    fn default() -> Self {
        Self {
            path: default_layouts_path(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            kind: DeviceKind::platform_default(),
            name: default_device_name(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Converts the file sections into a [`HostConfig`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::BindAddress`] if `server.bind_address` is not an IP,
    /// [`ConfigError::Liveness`] if the ping settings are unusable.
    pub fn to_host_config(&self) -> Result<HostConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.server.bind_address.clone()))?;
        let config = HostConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            layouts_path: self.layouts.path.clone(),
            device: self.device.kind,
            device_name: self.device.name.clone(),
            ping_interval: Duration::from_secs(self.server.ping_interval_secs),
            liveness_timeout: Duration::from_secs(self.server.liveness_timeout_secs),
            ..HostConfig::default()
        };
        config.check_liveness()?;
        Ok(config)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] if
/// the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
