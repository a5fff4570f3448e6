//! Buddy registry: the user's trusted peers and their live presence.
//!
//! The registry owns every [`Buddy`] and keeps two reverse indices
//! (name → buddy, node id → buddy) consistent on each mutation. Two
//! reconciliation passes keep presence fresh:
//!
//! - [`BuddyRegistry::tick`] (every 10s): probe nodes gone quiet for 30s,
//!   drop nodes gone quiet for 60s back to never-seen.
//! - [`BuddyRegistry::search_tick`] (every 10min): ask the overlay to locate
//!   every never-seen node.
//!
//! When constructed with [`BuddyRegistry::open`] the list (names and node ids
//! only, never addresses) is written back to disk on every structural change.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vlf_core::PeerId;

use crate::events::{emit, PresenceEvent, EVENT_CAPACITY};
use crate::overlay::Overlay;
use crate::presence::{Buddy, PresenceEntry, Sighting, LOSS_TIMEOUT, PROBE_THRESHOLD};

/// Persisted form of one buddy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuddyRecord {
    pub name: String,
    /// Hex node ids.
    pub nodes: Vec<String>,
}

/// Loader view of a record: node ids are checked one by one.
#[derive(Deserialize)]
struct RawRecord {
    name: String,
    #[serde(default)]
    nodes: Vec<serde_json::Value>,
}

/// What a liveness pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub probed: usize,
    pub lost: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, serde_json::Error),
}

pub struct BuddyRegistry {
    buddies: Vec<Buddy>,
    by_name: HashMap<String, usize>,
    by_node: HashMap<PeerId, usize>,
    events: broadcast::Sender<PresenceEvent>,
    persist_path: Option<PathBuf>,
}

impl Default for BuddyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuddyRegistry {
    /// In-memory registry, nothing is persisted.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            buddies: Vec::new(),
            by_name: HashMap::new(),
            by_node: HashMap::new(),
            events,
            persist_path: None,
        }
    }

    /// Load the buddy list at `path` and persist every later change there.
    ///
    /// A missing file is an empty list. A file that cannot be read or is not
    /// a JSON array is an error; single malformed records are skipped.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let mut registry = Self::new();
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let values: Vec<serde_json::Value> = serde_json::from_str(&text)
                    .map_err(|e| StoreError::ParseFailed(path.clone(), e))?;
                registry.load_values(values);
                tracing::info!(
                    buddies = registry.len(),
                    nodes = registry.by_node.len(),
                    path = %path.display(),
                    "loaded buddy list"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no buddy list yet");
            }
            Err(e) => return Err(StoreError::ReadFailed(path, e)),
        }
        registry.persist_path = Some(path);
        Ok(registry)
    }

    /// Independent stream of presence notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.events.subscribe()
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.buddies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buddies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buddy> {
        self.buddies.iter()
    }

    pub fn has_buddy(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Is `id` one of the nodes of some buddy.
    pub fn has_node(&self, id: &PeerId) -> bool {
        self.by_node.contains_key(id)
    }

    pub fn buddy(&self, name: &str) -> Option<&Buddy> {
        self.by_name.get(name).and_then(|&i| self.buddies.get(i))
    }

    /// The buddy owning node `id`.
    pub fn buddy_of(&self, id: &PeerId) -> Option<&Buddy> {
        self.by_node.get(id).and_then(|&i| self.buddies.get(i))
    }

    pub fn buddy_at(&self, index: usize) -> Option<&Buddy> {
        self.buddies.get(index)
    }

    pub fn buddy_name(&self, id: &PeerId) -> Option<&str> {
        self.buddy_of(id).map(Buddy::name)
    }

    pub fn node(&self, id: &PeerId) -> Option<&PresenceEntry> {
        self.buddy_of(id).and_then(|b| b.node(id))
    }

    /// Number of buddies with at least one reachable node.
    pub fn reachable_count(&self, now: Instant) -> usize {
        self.buddies.iter().filter(|b| b.is_reachable(now)).count()
    }

    // ── Structural mutation ───────────────────────────────────────────────────

    /// Add a buddy with a single never-seen node.
    ///
    /// No-op if `name` exists or `id` already belongs to a buddy. Returns
    /// whether the buddy was created.
    pub fn add_buddy(&mut self, name: &str, id: PeerId) -> bool {
        if self.has_buddy(name) {
            tracing::debug!(buddy = name, "buddy already present");
            return false;
        }
        if self.has_node(&id) {
            tracing::debug!(buddy = name, peer = %id, "node already assigned to a buddy");
            return false;
        }
        let mut buddy = Buddy::new(name);
        buddy.push(PresenceEntry::new(id));
        self.insert_buddy(buddy);
        tracing::info!(buddy = name, peer = %id, "buddy added");
        self.save();
        emit(&self.events, PresenceEvent::BuddiesChanged);
        true
    }

    /// Remove a buddy and all its nodes. No-op if absent.
    pub fn del_buddy(&mut self, name: &str) -> bool {
        let Some(&idx) = self.by_name.get(name) else {
            return false;
        };
        self.buddies.remove(idx);
        self.reindex();
        tracing::info!(buddy = name, "buddy removed");
        self.save();
        emit(&self.events, PresenceEvent::BuddiesChanged);
        true
    }

    /// Attach another node to an existing buddy, optionally already seen.
    /// A seen node is announced as appeared, so its later loss has a match.
    ///
    /// No-op if the buddy is absent or the node belongs to any buddy.
    pub fn add_node(&mut self, name: &str, id: PeerId, sighting: Option<Sighting>) -> bool {
        let Some(&idx) = self.by_name.get(name) else {
            return false;
        };
        if self.has_node(&id) {
            tracing::debug!(buddy = name, peer = %id, "node already assigned to a buddy");
            return false;
        }
        let seen = sighting.is_some();
        let entry = match sighting {
            Some(s) => PresenceEntry::seen(id, s),
            None => PresenceEntry::new(id),
        };
        let Some(buddy) = self.buddies.get_mut(idx) else {
            return false;
        };
        buddy.push(entry);
        self.by_node.insert(id, idx);
        tracing::info!(buddy = name, peer = %id, seen, "node added");
        self.save();
        emit(&self.events, PresenceEvent::BuddiesChanged);
        if seen {
            emit(&self.events, PresenceEvent::Appeared(id));
            emit(
                &self.events,
                PresenceEvent::Changed {
                    buddy: name.to_string(),
                },
            );
        }
        true
    }

    /// Detach a node from a buddy. No-op if either is absent.
    pub fn del_node(&mut self, name: &str, id: &PeerId) -> bool {
        let Some(&idx) = self.by_name.get(name) else {
            return false;
        };
        let removed = self
            .buddies
            .get_mut(idx)
            .is_some_and(|buddy| buddy.remove(id));
        if !removed {
            return false;
        }
        self.by_node.remove(id);
        tracing::info!(buddy = name, peer = %id, "node removed");
        self.save();
        emit(&self.events, PresenceEvent::BuddiesChanged);
        true
    }

    // ── Presence ──────────────────────────────────────────────────────────────

    /// The overlay heard from `id` at `addr`.
    pub fn on_peer_reachable(&mut self, id: &PeerId, addr: SocketAddr, now: Instant) {
        let Some(&idx) = self.by_node.get(id) else {
            tracing::trace!(peer = %id, "reachable peer is not a buddy");
            return;
        };
        let Some(buddy) = self.buddies.get_mut(idx) else {
            return;
        };
        let Some(entry) = buddy.node_mut(id) else {
            return;
        };
        let appeared = entry.update(addr, now);
        let name = buddy.name().to_string();

        if appeared {
            tracing::info!(buddy = %name, peer = %id, addr = %addr, "node appeared");
            emit(&self.events, PresenceEvent::Appeared(*id));
        }
        emit(&self.events, PresenceEvent::Changed { buddy: name });
    }

    /// A search for `id` succeeded. Ping it so that the reply marks the node
    /// reachable.
    pub fn on_peer_located(&self, id: &PeerId, addr: SocketAddr, overlay: &mut impl Overlay) {
        match self.node(id) {
            Some(entry) if !entry.has_been_seen() => {
                tracing::debug!(peer = %id, addr = %addr, "buddy node located, pinging");
                overlay.ping(addr);
            }
            _ => {}
        }
    }

    /// Liveness pass: probe quiet nodes, invalidate lost ones.
    pub fn tick(&mut self, now: Instant, overlay: &mut impl Overlay) -> TickSummary {
        let mut summary = TickSummary::default();
        let mut events = Vec::new();

        for buddy in &mut self.buddies {
            let mut changed = false;
            for entry in buddy.entries_mut() {
                let (Some(age), Some(addr)) = (entry.age(now), entry.addr()) else {
                    continue;
                };
                if age >= LOSS_TIMEOUT {
                    entry.invalidate();
                    tracing::info!(peer = %entry.id(), "node disappeared");
                    events.push(PresenceEvent::Disappeared(*entry.id()));
                    summary.lost += 1;
                    changed = true;
                } else if age >= PROBE_THRESHOLD {
                    tracing::debug!(peer = %entry.id(), addr = %addr, "probing quiet node");
                    overlay.ping(addr);
                    summary.probed += 1;
                }
            }
            if changed {
                events.push(PresenceEvent::Changed {
                    buddy: buddy.name().to_string(),
                });
            }
        }

        for event in events {
            emit(&self.events, event);
        }
        summary
    }

    /// Search pass: locate every never-seen node. Returns the number of
    /// searches issued.
    pub fn search_tick(&self, overlay: &mut impl Overlay) -> usize {
        let mut issued = 0;
        for entry in self.buddies.iter().flat_map(|b| b.entries()) {
            if !entry.has_been_seen() {
                overlay.find_node(*entry.id());
                issued += 1;
            }
        }
        if issued > 0 {
            tracing::debug!(searches = issued, "searching for offline buddies");
        }
        issued
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    /// Persisted form, in list order.
    pub fn to_records(&self) -> Vec<BuddyRecord> {
        self.buddies
            .iter()
            .map(|b| BuddyRecord {
                name: b.name().to_string(),
                nodes: b.entries().iter().map(|e| e.id().to_hex()).collect(),
            })
            .collect()
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    fn load_values(&mut self, values: Vec<serde_json::Value>) {
        for (index, value) in values.into_iter().enumerate() {
            let record: RawRecord = match serde_json::from_value(value) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(index, error = %e, "malformed buddy record, skipped");
                    continue;
                }
            };
            if self.has_buddy(&record.name) {
                tracing::warn!(index, buddy = %record.name, "duplicate buddy name, skipped");
                continue;
            }
            let mut buddy = Buddy::new(record.name);
            for node in record.nodes {
                let id = match node.as_str().map(PeerId::from_hex) {
                    Some(Ok(id)) => id,
                    Some(Err(e)) => {
                        tracing::warn!(buddy = buddy.name(), error = %e, "malformed node id, skipped");
                        continue;
                    }
                    None => {
                        tracing::warn!(buddy = buddy.name(), node = %node, "node id is not a string, skipped");
                        continue;
                    }
                };
                if self.has_node(&id) || !buddy.push(PresenceEntry::new(id)) {
                    tracing::warn!(buddy = buddy.name(), peer = %id, "duplicate node id, skipped");
                }
            }
            self.insert_buddy(buddy);
        }
    }

    /// Serialize the list to disk. Best-effort, failures are logged.
    fn save(&self) {
        let Some(path) = self.persist_path.as_deref() else {
            return;
        };
        let json = match serde_json::to_string_pretty(&self.to_records()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize buddy list");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, path = %path.display(), "failed to create data dir");
                return;
            }
        }
        if let Err(e) = std::fs::write(path, json) {
            tracing::warn!(error = %e, path = %path.display(), "failed to persist buddy list");
        }
    }

    // ── Indices ───────────────────────────────────────────────────────────────

    fn insert_buddy(&mut self, buddy: Buddy) {
        let idx = self.buddies.len();
        self.by_name.insert(buddy.name().to_string(), idx);
        for entry in buddy.entries() {
            self.by_node.insert(*entry.id(), idx);
        }
        self.buddies.push(buddy);
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        self.by_node.clear();
        for (idx, buddy) in self.buddies.iter().enumerate() {
            self.by_name.insert(buddy.name().to_string(), idx);
            for entry in buddy.entries() {
                self.by_node.insert(*entry.id(), idx);
            }
        }
    }
}
