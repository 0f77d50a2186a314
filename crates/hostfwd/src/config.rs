//! Configuration management for hostfwd.
//!
//! Loads settings from /etc/hostfw/config.toml or uses defaults.

use anyhow::{Context, Result};
use hostfw_shared::job::{DEFAULT_UNIT_PREFIX, DEFAULT_UNIT_SUFFIX};
use hostfw_shared::rpc::SOCKET_PATH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/hostfw/config.toml";

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// One subdirectory per staged image id
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// Where the resident image's table of contents lives
    #[serde(default = "default_resident_dir")]
    pub resident_dir: PathBuf,

    /// TOC file name, both in the resident dir and in staging dirs
    #[serde(default = "default_toc_file")]
    pub toc_file: String,

    /// Published status snapshot
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,

    /// Control socket
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("/tmp/images")
}

fn default_resident_dir() -> PathBuf {
    PathBuf::from("/host-fw")
}

fn default_toc_file() -> String {
    "pnor.toc".to_string()
}

fn default_status_file() -> PathBuf {
    PathBuf::from("/run/hostfw/status.json")
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(SOCKET_PATH)
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            resident_dir: default_resident_dir(),
            toc_file: default_toc_file(),
            status_file: default_status_file(),
            socket_path: default_socket_path(),
        }
    }
}

/// Payload and job naming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Payload file extension, without the dot
    #[serde(default = "default_payload_extension")]
    pub payload_extension: String,

    #[serde(default = "default_unit_prefix")]
    pub unit_prefix: String,

    #[serde(default = "default_unit_suffix")]
    pub unit_suffix: String,
}

fn default_payload_extension() -> String {
    "squashfs".to_string()
}

fn default_unit_prefix() -> String {
    DEFAULT_UNIT_PREFIX.to_string()
}

fn default_unit_suffix() -> String {
    DEFAULT_UNIT_SUFFIX.to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            payload_extension: default_payload_extension(),
            unit_prefix: default_unit_prefix(),
            unit_suffix: default_unit_suffix(),
        }
    }
}

/// Flash job launcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Program started for every flash job
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments; `{unit}` and `{payload}` are substituted
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Fail an activation that has seen no completion after this long (0 = never)
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,
}

fn default_program() -> String {
    "systemctl".to_string()
}

fn default_args() -> Vec<String> {
    vec!["start".to_string(), "--wait".to_string(), "{unit}".to_string()]
}

fn default_dispatch_timeout() -> u64 {
    1800
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            dispatch_timeout_secs: default_dispatch_timeout(),
        }
    }
}

impl ExecutorConfig {
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        (self.dispatch_timeout_secs > 0).then(|| Duration::from_secs(self.dispatch_timeout_secs))
    }
}

/// Staging watcher and activation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Periodic full rescan of the staging root (0 = disabled)
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval_secs: u64,

    /// Request activation as soon as a new image is ingested
    #[serde(default)]
    pub auto_activate: bool,
}

fn default_rescan_interval() -> u64 {
    30
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            rescan_interval_secs: default_rescan_interval(),
            auto_activate: false,
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::load_from_path(Path::new(CONFIG_PATH)).unwrap_or_else(|e| {
            warn!("Config not loaded, using defaults: {:#}", e);
            Config::default()
        })
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn resident_toc(&self) -> PathBuf {
        self.paths.resident_dir.join(&self.paths.toc_file)
    }
}
