//! Channel link to the overlay process.
//!
//! [`ChannelOverlay`] implements the core's [`Overlay`] trait by turning
//! every request into an [`OverlayCommand`] on an unbounded channel.
//! Requests never block the control loop; if the overlay side has gone
//! away the command is dropped.

use std::net::SocketAddr;

use tokio::sync::{mpsc, watch};
use vlf_core::PeerId;
use vlf_services::{LocatedPeer, Overlay, OverlayStats, Session, SessionPayload};

#[derive(Debug)]
pub enum OverlayCommand {
    Ping(SocketAddr),
    PingHost {
        host: String,
        port: u16,
    },
    FindNode(PeerId),
    StartConnection {
        service: &'static str,
        peer: LocatedPeer,
        session: Session,
    },
    AcceptConnection {
        service: String,
        peer: PeerId,
        payload: Option<SessionPayload>,
    },
    RejectConnection {
        service: String,
        peer: PeerId,
    },
}

pub struct ChannelOverlay {
    self_id: PeerId,
    commands: mpsc::UnboundedSender<OverlayCommand>,
    stats: watch::Receiver<OverlayStats>,
}

impl ChannelOverlay {
    /// `stats` is published by the overlay side, read on demand.
    pub fn new(
        self_id: PeerId,
        commands: mpsc::UnboundedSender<OverlayCommand>,
        stats: watch::Receiver<OverlayStats>,
    ) -> Self {
        Self {
            self_id,
            commands,
            stats,
        }
    }

    /// Overlay link plus the receiving ends the overlay side drives.
    pub fn pair(
        self_id: PeerId,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<OverlayCommand>,
        watch::Sender<OverlayStats>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stats_tx, stats_rx) = watch::channel(OverlayStats::default());
        (Self::new(self_id, cmd_tx, stats_rx), cmd_rx, stats_tx)
    }

    fn send(&self, command: OverlayCommand) {
        if let Err(e) = self.commands.send(command) {
            tracing::debug!(command = ?e.0, "overlay link closed, command dropped");
        }
    }
}

impl Overlay for ChannelOverlay {
    fn self_id(&self) -> PeerId {
        self.self_id
    }

    fn ping(&mut self, addr: SocketAddr) {
        self.send(OverlayCommand::Ping(addr));
    }

    fn ping_host(&mut self, host: &str, port: u16) {
        self.send(OverlayCommand::PingHost {
            host: host.to_string(),
            port,
        });
    }

    fn find_node(&mut self, id: PeerId) {
        self.send(OverlayCommand::FindNode(id));
    }

    fn start_connection(&mut self, service: &'static str, peer: &LocatedPeer, session: Session) {
        self.send(OverlayCommand::StartConnection {
            service,
            peer: *peer,
            session,
        });
    }

    fn accept_connection(&mut self, service: &str, peer: PeerId, payload: Option<SessionPayload>) {
        self.send(OverlayCommand::AcceptConnection {
            service: service.to_string(),
            peer,
            payload,
        });
    }

    fn reject_connection(&mut self, service: &str, peer: PeerId) {
        self.send(OverlayCommand::RejectConnection {
            service: service.to_string(),
            peer,
        });
    }

    fn stats(&self) -> OverlayStats {
        *self.stats.borrow()
    }
}
