//! Outgoing connection dispatch.
//!
//! A request parks its payload in the pending table and asks the overlay
//! to locate the peer. The locate result decides the entry's fate:
//! located peers get a session and a handshake, unlocated ones are
//! reported unreachable. Results for peers with no pending entry are
//! ignored.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use vlf_core::PeerId;

use crate::events::{emit, ConnectionEvent, EVENT_CAPACITY};
use crate::overlay::{LocatedPeer, Overlay};
use crate::pending::{PendingConnection, PendingConnectionTable, RequestError};
use crate::session::{ConnectionKind, Session, SessionId, SessionPayload};

pub struct ConnectionDispatcher {
    pending: PendingConnectionTable,
    events: broadcast::Sender<ConnectionEvent>,
}

impl Default for ConnectionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionDispatcher {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            pending: PendingConnectionTable::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Start connecting to `peer`. Fails with `Busy` if a connection to the
    /// same peer is still being located.
    pub fn request(
        &mut self,
        peer: PeerId,
        payload: SessionPayload,
        now: Instant,
        overlay: &mut impl Overlay,
    ) -> Result<(), RequestError> {
        let kind = payload.kind();
        self.pending.insert(peer, payload, now)?;
        tracing::debug!(peer = %peer, kind = %kind, "locating peer");
        overlay.find_node(peer);
        Ok(())
    }

    /// The overlay located `peer`. Returns the id of the started session.
    pub fn on_located(
        &mut self,
        peer: &LocatedPeer,
        overlay: &mut impl Overlay,
    ) -> Option<SessionId> {
        let Some(entry) = self.pending.take(&peer.id) else {
            tracing::trace!(peer = %peer.id, "located peer has no pending connection");
            return None;
        };
        let kind = entry.kind();

        let session = match Session::open(entry.payload, peer) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(peer = %peer.id, kind = %kind, error = %e, "failed to open session");
                emit(
                    &self.events,
                    ConnectionEvent::Failed {
                        peer: peer.id,
                        kind,
                        reason: e.to_string(),
                    },
                );
                return None;
            }
        };

        let id = session.id();
        tracing::info!(peer = %peer.id, addr = %peer.addr, kind = %kind, session = %id, "starting connection");
        overlay.start_connection(kind.service_name(), peer, session);
        emit(
            &self.events,
            ConnectionEvent::Started {
                peer: peer.id,
                kind,
                session: id,
            },
        );
        Some(id)
    }

    /// The overlay gave up locating `peer`. Returns whether a pending
    /// connection was failed.
    pub fn on_not_located(&mut self, peer: &PeerId, candidates: &[LocatedPeer]) -> bool {
        let Some(entry) = self.pending.take(peer) else {
            tracing::trace!(peer = %peer, "unlocated peer has no pending connection");
            return false;
        };
        tracing::info!(
            peer = %peer,
            kind = %entry.kind(),
            candidates = candidates.len(),
            "peer not found"
        );
        self.fail_unreachable(entry);
        true
    }

    /// Drop a pending connection and hand its payload back.
    pub fn cancel(&mut self, peer: &PeerId) -> Option<SessionPayload> {
        let entry = self.pending.take(peer)?;
        tracing::debug!(peer = %peer, kind = %entry.kind(), "pending connection cancelled");
        Some(entry.payload)
    }

    /// Fail every entry still waiting on a locate after `timeout`.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> usize {
        let expired = self.pending.take_expired(now, timeout);
        let count = expired.len();
        for entry in expired {
            tracing::info!(peer = %entry.peer, kind = %entry.kind(), "locate timed out");
            self.fail_unreachable(entry);
        }
        count
    }

    /// The handshake for an already started session failed in the overlay.
    pub fn handshake_failed(&self, peer: PeerId, kind: ConnectionKind, reason: &str) {
        tracing::warn!(peer = %peer, kind = %kind, reason, "handshake failed");
        emit(
            &self.events,
            ConnectionEvent::Failed {
                peer,
                kind,
                reason: reason.to_string(),
            },
        );
    }

    /// An inbound offer was turned down.
    pub fn refused(&self, peer: PeerId, service: &str) {
        tracing::info!(peer = %peer, service, "inbound connection refused");
        emit(
            &self.events,
            ConnectionEvent::Refused {
                peer,
                service: service.to_string(),
            },
        );
    }

    pub fn is_pending(&self, peer: &PeerId) -> bool {
        self.pending.contains(peer)
    }

    pub fn pending(&self, peer: &PeerId) -> Option<&PendingConnection> {
        self.pending.get(peer)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn fail_unreachable(&self, entry: PendingConnection) {
        emit(
            &self.events,
            ConnectionEvent::Unreachable {
                peer: entry.peer,
                kind: entry.kind(),
            },
        );
    }
}
