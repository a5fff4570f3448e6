//! Bootstrap node list: `["host[:port]", ...]` in a JSON file.
//!
//! The list is read once at start-up and rewritten whenever the user adds
//! a node. Entries that cannot be parsed are skipped, never fatal.

use std::path::{Path, PathBuf};

/// Port assumed for entries written without one.
pub const DEFAULT_BOOTSTRAP_PORT: u16 = 7741;

/// Ordered, duplicate-free list of `(host, port)` pairs.
#[derive(Debug, Clone, Default)]
pub struct BootstrapList {
    nodes: Vec<(String, u16)>,
    path: Option<PathBuf>,
}

impl BootstrapList {
    /// Read the list from `path`. A missing or malformed file gives an empty
    /// list that is still bound to `path` for later writes.
    pub fn load(path: PathBuf, default_port: u16) -> Self {
        let nodes = read_nodes(&path, default_port);
        tracing::debug!(count = nodes.len(), path = %path.display(), "loaded bootstrap list");
        Self {
            nodes,
            path: Some(path),
        }
    }

    /// Add a node and persist the list. Duplicates are ignored.
    pub fn insert(&mut self, host: &str, port: u16) {
        let node = (host.to_string(), port);
        if self.nodes.contains(&node) {
            return;
        }
        self.nodes.push(node);
        self.save();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.nodes.iter().map(|(h, p)| (h.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize to disk. Best-effort, failures are logged.
    fn save(&self) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let entries: Vec<String> = self
            .nodes
            .iter()
            .map(|(host, port)| format!("{host}:{port}"))
            .collect();
        if let Err(e) = write_json(path, &entries) {
            tracing::warn!(error = %e, path = %path.display(), "failed to persist bootstrap list");
        }
    }
}

fn read_nodes(path: &Path, default_port: u16) -> Vec<(String, u16)> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "failed to read bootstrap list");
            return Vec::new();
        }
    };
    let values: Vec<serde_json::Value> = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "failed to parse bootstrap list");
            return Vec::new();
        }
    };
    let mut nodes = Vec::new();
    for value in values {
        let Some(entry) = value.as_str() else {
            tracing::warn!(entry = %value, "bootstrap entry is not a string, skipped");
            continue;
        };
        match parse_host_port(entry, default_port) {
            Some(node) if !nodes.contains(&node) => nodes.push(node),
            Some(_) => {}
            None => tracing::warn!(entry, "malformed bootstrap entry, skipped"),
        }
    }
    nodes
}

/// Split `"host[:port]"`. A host with more than one `:` is rejected.
pub fn parse_host_port(entry: &str, default_port: u16) -> Option<(String, u16)> {
    let entry = entry.trim();
    let (host, port) = match entry.split_once(':') {
        None => (entry, default_port),
        Some((host, port)) => {
            if port.contains(':') {
                return None;
            }
            (host, port.parse().ok()?)
        }
    };
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
}
