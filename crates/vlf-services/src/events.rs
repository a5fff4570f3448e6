//! Notifications published by the core.
//!
//! Both streams are `tokio::sync::broadcast` channels, so any number of
//! presentation layers or test harnesses can subscribe independently.
//! Events are sent only after the state change they describe is complete.

use tokio::sync::broadcast;
use vlf_core::PeerId;

use crate::session::{ConnectionKind, SessionId};

/// Buffered events per subscriber before the slowest one starts lagging.
pub const EVENT_CAPACITY: usize = 256;

/// Presence changes in the buddy registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A never-seen node was seen.
    Appeared(PeerId),
    /// A seen node timed out and is back to never-seen.
    Disappeared(PeerId),
    /// Some node of this buddy changed state.
    Changed { buddy: String },
    /// Buddies or nodes were added or removed.
    BuddiesChanged,
}

/// User-visible outcome of connection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Started {
        peer: PeerId,
        kind: ConnectionKind,
        session: SessionId,
    },
    /// The overlay could not locate the peer.
    Unreachable { peer: PeerId, kind: ConnectionKind },
    /// The peer was located but the local session could not be built or
    /// the handshake failed.
    Failed {
        peer: PeerId,
        kind: ConnectionKind,
        reason: String,
    },
    /// An inbound offer was turned down.
    Refused { peer: PeerId, service: String },
}

/// Send without caring whether anybody listens.
pub(crate) fn emit<T: Clone>(tx: &broadcast::Sender<T>, event: T) {
    let _ = tx.send(event);
}

/// Drain whatever is buffered for a test subscriber.
#[cfg(test)]
pub(crate) fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
