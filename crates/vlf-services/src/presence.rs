//! Presence model: buddies and the network identities they are known by.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use vlf_core::PeerId;

/// A node not heard from for this long is considered lost.
pub const LOSS_TIMEOUT: Duration = Duration::from_secs(60);

/// A node not heard from for this long gets a liveness probe.
pub const PROBE_THRESHOLD: Duration = Duration::from_secs(30);

/// Where and when a node was last heard from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
    pub addr: SocketAddr,
    pub last_seen: Instant,
}

/// One tracked network identity of a buddy.
///
/// `sighting == None` is the never-seen state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    id: PeerId,
    sighting: Option<Sighting>,
}

impl PresenceEntry {
    pub fn new(id: PeerId) -> Self {
        Self { id, sighting: None }
    }

    pub fn seen(id: PeerId, sighting: Sighting) -> Self {
        Self {
            id,
            sighting: Some(sighting),
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn sighting(&self) -> Option<&Sighting> {
        self.sighting.as_ref()
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.sighting.map(|s| s.addr)
    }

    pub fn has_been_seen(&self) -> bool {
        self.sighting.is_some()
    }

    /// Time since the last sighting, if any.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.sighting
            .map(|s| now.saturating_duration_since(s.last_seen))
    }

    pub fn is_reachable(&self, now: Instant) -> bool {
        self.age(now).is_some_and(|age| age < LOSS_TIMEOUT)
    }

    /// Record a sighting. Returns `true` if the entry was never-seen before.
    pub fn update(&mut self, addr: SocketAddr, now: Instant) -> bool {
        let appeared = self.sighting.is_none();
        self.sighting = Some(Sighting {
            addr,
            last_seen: now,
        });
        appeared
    }

    /// Back to never-seen.
    pub fn invalidate(&mut self) {
        self.sighting = None;
    }
}

/// A named trust group: one person, possibly several nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buddy {
    name: String,
    entries: Vec<PresenceEntry>,
}

impl Buddy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[PresenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_node(&self, id: &PeerId) -> bool {
        self.index(id).is_some()
    }

    /// Position of `id` within this buddy.
    pub fn index(&self, id: &PeerId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    pub fn node(&self, id: &PeerId) -> Option<&PresenceEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub(crate) fn node_mut(&mut self, id: &PeerId) -> Option<&mut PresenceEntry> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [PresenceEntry] {
        &mut self.entries
    }

    /// Append an entry. Returns `false` if the id is already present.
    pub(crate) fn push(&mut self, entry: PresenceEntry) -> bool {
        if self.has_node(entry.id()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove `id`. Returns `false` if it was not present.
    pub(crate) fn remove(&mut self, id: &PeerId) -> bool {
        match self.index(id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_reachable(&self, now: Instant) -> bool {
        self.entries.iter().any(|e| e.is_reachable(now))
    }
}
