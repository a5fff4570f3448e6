//! Runtime configuration for vlf.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VLF_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vlf/config.toml
//!   3. ~/.config/vlf/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::bootstrap::DEFAULT_BOOTSTRAP_PORT;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VlfConfig {
    pub storage: StorageConfig,
    pub presence: PresenceConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding buddies.json, bootstrap.json and settings.json.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Liveness reconciliation period.
    pub probe_interval_secs: u64,
    /// Search reconciliation period for never-seen buddy nodes.
    pub search_interval_secs: u64,
    /// Pending connections older than this are failed as unreachable. 0 = never.
    pub locate_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// While disconnected, re-ping the bootstrap list this often.
    pub reconnect_interval_secs: u64,
    /// Port assumed for bootstrap entries written without one.
    pub default_bootstrap_port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: data_dir(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 10,
            search_interval_secs: 600,
            locate_timeout_secs: 120,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_secs: 60,
            default_bootstrap_port: DEFAULT_BOOTSTRAP_PORT,
        }
    }
}

impl StorageConfig {
    pub fn buddies_path(&self) -> PathBuf {
        self.data_dir.join("buddies.json")
    }

    pub fn bootstrap_path(&self) -> PathBuf {
        self.data_dir.join("bootstrap.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

impl PresenceConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn search_interval(&self) -> Duration {
        Duration::from_secs(self.search_interval_secs.max(1))
    }

    pub fn locate_timeout(&self) -> Option<Duration> {
        (self.locate_timeout_secs > 0).then(|| Duration::from_secs(self.locate_timeout_secs))
    }
}

impl NetworkConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs.max(1))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vlf")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("vlf")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl VlfConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit file, then apply env overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            VlfConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VLF_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&VlfConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply VLF_* overrides, looked up through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("VLF_STORAGE__DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        let secs = |key: &str| var(key).and_then(|v| v.parse::<u64>().ok());
        if let Some(secs) = secs("VLF_PRESENCE__PROBE_INTERVAL_SECS") {
            self.presence.probe_interval_secs = secs;
        }
        if let Some(secs) = secs("VLF_PRESENCE__SEARCH_INTERVAL_SECS") {
            self.presence.search_interval_secs = secs;
        }
        if let Some(secs) = secs("VLF_PRESENCE__LOCATE_TIMEOUT_SECS") {
            self.presence.locate_timeout_secs = secs;
        }
    }
}
