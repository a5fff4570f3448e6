//! Pending connection table: outgoing intents waiting on a locate.
//!
//! At most one entry per peer. An entry leaves the table exactly once:
//! resolved, failed, cancelled or expired. Removal is the terminal
//! transition, so a late event for the same peer finds nothing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use vlf_core::PeerId;

use crate::session::{ConnectionKind, SessionPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConnection {
    pub peer: PeerId,
    pub payload: SessionPayload,
    pub requested_at: Instant,
}

impl PendingConnection {
    pub fn kind(&self) -> ConnectionKind {
        self.payload.kind()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// A connection to `peer` is already being set up. The rejected payload
    /// is handed back.
    #[error("a connection to {peer} is already pending")]
    Busy {
        peer: PeerId,
        payload: SessionPayload,
    },
}

#[derive(Debug, Default)]
pub struct PendingConnectionTable {
    entries: HashMap<PeerId, PendingConnection>,
}

impl PendingConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `payload` for `peer`. The existing entry wins on conflict.
    pub fn insert(
        &mut self,
        peer: PeerId,
        payload: SessionPayload,
        now: Instant,
    ) -> Result<(), RequestError> {
        if self.entries.contains_key(&peer) {
            return Err(RequestError::Busy { peer, payload });
        }
        self.entries.insert(
            peer,
            PendingConnection {
                peer,
                payload,
                requested_at: now,
            },
        );
        Ok(())
    }

    pub fn take(&mut self, peer: &PeerId) -> Option<PendingConnection> {
        self.entries.remove(peer)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PendingConnection> {
        self.entries.get(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.entries.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every entry requested at least `timeout` ago.
    pub fn take_expired(&mut self, now: Instant, timeout: Duration) -> Vec<PendingConnection> {
        let stale: Vec<PeerId> = self
            .entries
            .values()
            .filter(|e| now.saturating_duration_since(e.requested_at) >= timeout)
            .map(|e| e.peer)
            .collect();
        stale
            .iter()
            .filter_map(|peer| self.entries.remove(peer))
            .collect()
    }
}
