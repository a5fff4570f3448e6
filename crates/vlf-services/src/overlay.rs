//! The overlay collaborator, seen from the core.
//!
//! Routing, transport and handshakes live in the overlay. The core only
//! issues fire-and-forget requests through this trait; results come back
//! later as events the host feeds into the registry and the dispatcher.

use std::net::SocketAddr;

use serde::Serialize;
use vlf_core::PeerId;

use crate::session::{Session, SessionPayload};

/// A peer the overlay has resolved to a network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedPeer {
    pub id: PeerId,
    pub addr: SocketAddr,
}

/// Read-only counters, consumed for status display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverlayStats {
    pub peers: usize,
    pub active_sessions: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub in_rate: f64,
    pub out_rate: f64,
}

/// Requests the core issues to the overlay. None of them block.
pub trait Overlay {
    fn self_id(&self) -> PeerId;

    /// Liveness probe. A reply surfaces as a peer-reachable event.
    fn ping(&mut self, addr: SocketAddr);

    /// Probe by host name (bootstrap nodes).
    fn ping_host(&mut self, host: &str, port: u16);

    /// Locate `id`. Must terminate in a located or not-located event.
    fn find_node(&mut self, id: PeerId);

    /// Start the protocol handshake for `service` with a located peer,
    /// using `session` as the local endpoint.
    fn start_connection(&mut self, service: &'static str, peer: &LocatedPeer, session: Session);

    /// Answer an inbound offer positively. `payload` is `None` when the
    /// service keeps its endpoint inside the overlay layer.
    fn accept_connection(&mut self, service: &str, peer: PeerId, payload: Option<SessionPayload>);

    fn reject_connection(&mut self, service: &str, peer: PeerId);

    fn stats(&self) -> OverlayStats;
}
