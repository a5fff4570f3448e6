//! User settings: the JSON file edited from the settings dialog.
//!
//! ```json
//! { "socks_service": { "enabled": false, "allow_buddies": false,
//!                      "allow_whitelist": false, "whitelist": ["<hex id>"] },
//!   "upnp": { "enabled": false, "external-port": 7742 } }
//! ```
//!
//! Missing keys take their defaults. Whitelist ids that do not parse are
//! dropped with a warning rather than failing the whole file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::identity::PeerId;

/// Default external port requested from the gateway.
pub const DEFAULT_UPNP_PORT: u16 = 7742;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub socks_service: SocksServiceSettings,
    pub upnp: UpnpSettings,
}

/// Who may use the local SOCKS exit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocksServiceSettings {
    pub enabled: bool,
    pub allow_buddies: bool,
    pub allow_whitelist: bool,
    #[serde(deserialize_with = "lenient_ids")]
    pub whitelist: HashSet<PeerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpnpSettings {
    pub enabled: bool,
    #[serde(rename = "external-port")]
    pub external_port: u16,
}

impl Default for UpnpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            external_port: DEFAULT_UPNP_PORT,
        }
    }
}

impl SocksServiceSettings {
    /// Admission rule for inbound SOCKS connections. `is_buddy` is the
    /// buddy-list membership of `peer`.
    pub fn admits(&self, peer: &PeerId, is_buddy: bool) -> bool {
        if !self.enabled {
            return false;
        }
        (self.allow_buddies && is_buddy)
            || (self.allow_whitelist && self.whitelist.contains(peer))
    }
}

fn lenient_ids<'de, D: Deserializer<'de>>(d: D) -> Result<HashSet<PeerId>, D::Error> {
    let raw: Vec<serde_json::Value> = Deserialize::deserialize(d)?;
    let mut ids = HashSet::new();
    for value in raw {
        match value.as_str().map(PeerId::from_hex) {
            Some(Ok(id)) => {
                ids.insert(id);
            }
            Some(Err(e)) => tracing::warn!(error = %e, "invalid whitelist id, skipped"),
            None => tracing::warn!(entry = %value, "whitelist entry is not a string, skipped"),
        }
    }
    Ok(ids)
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, serde_json::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(serde_json::Error),
}

impl Settings {
    /// Load settings from `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(SettingsError::ReadFailed(path.to_path_buf(), e)),
        };
        tracing::debug!(path = %path.display(), "loading settings");
        serde_json::from_str(&text).map_err(|e| SettingsError::ParseFailed(path.to_path_buf(), e))
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(SettingsError::SerializeFailed)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::WriteFailed(path.to_path_buf(), e))?;
        }
        std::fs::write(path, json).map_err(|e| SettingsError::WriteFailed(path.to_path_buf(), e))
    }
}
