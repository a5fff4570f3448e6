//! vlf integration test harness.
//!
//! Each test runs a real `ControlLoop` on a paused tokio clock. The test
//! plays the overlay: it reads the `OverlayCommand`s the loop issues and
//! feeds `HostEvent`s back. Timers fire as the test sleeps.
//!
//!   cargo test --test integration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub use vlf_core::{PeerId, VlfConfig, PEER_ID_LEN};
pub use vlf_host::{ChannelOverlay, ControlLoop, HostEvent, HostStatus, OverlayCommand};
pub use vlf_services::{
    ConnectionEvent, ConnectionKind, LocatedPeer, OverlayStats, PresenceEvent, Session,
};

mod connections;
mod lifecycle;

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn peer(b: u8) -> PeerId {
    PeerId::from_bytes([b; PEER_ID_LEN])
}

pub fn located(b: u8) -> LocatedPeer {
    LocatedPeer {
        id: peer(b),
        addr: format!("192.0.2.{b}:7741").parse().unwrap(),
    }
}

/// Fresh, empty data dir for one test.
pub fn data_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vlf-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn config_for(dir: &std::path::Path) -> VlfConfig {
    let mut config = VlfConfig::default();
    config.storage.data_dir = dir.to_path_buf();
    config
}

/// A running control loop plus the overlay side of its channels.
pub struct Harness {
    pub events: mpsc::UnboundedSender<HostEvent>,
    pub commands: mpsc::UnboundedReceiver<OverlayCommand>,
    pub stats: watch::Sender<OverlayStats>,
    pub presence: broadcast::Receiver<PresenceEvent>,
    pub connections: broadcast::Receiver<ConnectionEvent>,
    pub shutdown: broadcast::Sender<()>,
    pub task: JoinHandle<Result<()>>,
    pub dir: PathBuf,
}

impl Harness {
    /// Start in a fresh data dir.
    pub fn start(tag: &str) -> Result<Self> {
        Self::start_in(data_dir(tag))
    }

    /// Start on whatever `dir` already holds.
    pub fn start_in(dir: PathBuf) -> Result<Self> {
        let (overlay, commands, stats) = ChannelOverlay::pair(peer(0xee));
        let control = ControlLoop::from_config(config_for(&dir), overlay)?;
        let presence = control.subscribe_presence();
        let connections = control.subscribe_connections();

        let (events, events_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(1);
        let task = tokio::spawn(control.run(events_rx, shutdown.subscribe()));

        Ok(Self {
            events,
            commands,
            stats,
            presence,
            connections,
            shutdown,
            task,
            dir,
        })
    }

    pub fn send(&self, event: HostEvent) {
        self.events.send(event).expect("control loop is gone");
    }

    /// Round-trip through the loop. Everything sent before has been
    /// handled when this returns.
    pub async fn status(&self) -> HostStatus {
        let (tx, rx) = oneshot::channel();
        self.send(HostEvent::Status(tx));
        rx.await.expect("control loop dropped the status request")
    }

    /// Let the clock run for `secs`, then wait for the loop to settle.
    pub async fn advance(&self, secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        self.status().await;
    }

    pub fn drain_commands(&mut self) -> Vec<OverlayCommand> {
        let mut out = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            out.push(command);
        }
        out
    }

    pub fn drain_presence(&mut self) -> Vec<PresenceEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.presence.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn drain_connections(&mut self) -> Vec<ConnectionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.connections.try_recv() {
            out.push(event);
        }
        out
    }

    /// Signal shutdown and wait for the loop to exit. Returns the data dir.
    pub async fn stop(self) -> Result<PathBuf> {
        let _ = self.shutdown.send(());
        self.task.await.context("control loop panicked")??;
        Ok(self.dir)
    }
}
