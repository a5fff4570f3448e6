//! The control loop: one task owning all presence and connection state.
//!
//! Overlay events and user actions arrive as [`HostEvent`]s on one channel
//! and are handled in arrival order. Three timers drive the periodic work:
//!
//! - presence (10s): liveness pass over buddy nodes, pending-locate expiry
//! - search (10min): locate every never-seen buddy node
//! - reconnect (60s): while disconnected, ping the bootstrap nodes

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use vlf_core::bootstrap::parse_host_port;
use vlf_core::{BootstrapList, PeerId, Settings, VlfConfig};
use vlf_services::{
    BuddyRegistry, ConnectionDispatcher, ConnectionEvent, ConnectionKind, LocatedPeer, Overlay,
    OverlayStats, PresenceEvent, RequestError, ServiceDirectory, SessionId, SessionPayload,
};

#[derive(Debug)]
pub enum HostEvent {
    // ── From the overlay ──
    PeerReachable {
        peer: PeerId,
        addr: SocketAddr,
    },
    PeerLocated(LocatedPeer),
    PeerNotLocated {
        peer: PeerId,
        candidates: Vec<LocatedPeer>,
    },
    IncomingConnection {
        service: String,
        peer: PeerId,
    },
    ConnectionStarted {
        service: String,
        peer: PeerId,
        session: SessionId,
    },
    ConnectionFailed {
        service: String,
        peer: PeerId,
        session: SessionId,
        reason: String,
    },
    Connected,
    Disconnected,

    // ── From the user ──
    Chat(PeerId),
    Call(PeerId),
    SendFile {
        peer: PeerId,
        path: PathBuf,
    },
    Cancel(PeerId),
    AddBuddy {
        name: String,
        peer: PeerId,
    },
    DelBuddy(String),
    AddNode {
        name: String,
        peer: PeerId,
    },
    DelNode {
        name: String,
        peer: PeerId,
    },
    /// `host[:port]` of a node to join through.
    Bootstrap(String),
    UpdateSettings(Settings),
    Status(oneshot::Sender<HostStatus>),
}

/// Snapshot for status display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostStatus {
    pub self_id: String,
    pub connected: bool,
    pub buddies: usize,
    pub reachable_buddies: usize,
    pub pending_connections: usize,
    pub bootstrap_nodes: usize,
    pub overlay: OverlayStats,
}

impl HostStatus {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize status")
    }
}

pub struct ControlLoop<O: Overlay> {
    config: VlfConfig,
    registry: BuddyRegistry,
    dispatcher: ConnectionDispatcher,
    directory: ServiceDirectory,
    bootstrap: BootstrapList,
    overlay: O,
    connected: bool,
}

impl<O: Overlay> ControlLoop<O> {
    /// Load the buddy list, settings and bootstrap list from the configured
    /// data directory. A buddy list that cannot be read is fatal; the loop
    /// must not overwrite it with an empty one.
    pub fn from_config(config: VlfConfig, overlay: O) -> anyhow::Result<Self> {
        let storage = &config.storage;
        std::fs::create_dir_all(&storage.data_dir).with_context(|| {
            format!("failed to create data dir {}", storage.data_dir.display())
        })?;

        let registry =
            BuddyRegistry::open(storage.buddies_path()).context("failed to load buddy list")?;

        let settings_path = storage.settings_path();
        let settings = match Settings::load(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "unusable settings file, using defaults");
                Settings::default()
            }
        };

        let bootstrap = BootstrapList::load(
            storage.bootstrap_path(),
            config.network.default_bootstrap_port,
        );
        let directory = ServiceDirectory::with_defaults(settings.socks_service.clone());

        tracing::info!(
            self_id = %overlay.self_id(),
            buddies = registry.len(),
            bootstrap_nodes = bootstrap.len(),
            data_dir = %storage.data_dir.display(),
            "control loop ready"
        );

        Ok(Self {
            config,
            registry,
            dispatcher: ConnectionDispatcher::new(),
            directory,
            bootstrap,
            overlay,
            connected: false,
        })
    }

    /// Same as [`from_config`](Self::from_config) with the config found
    /// through `$VLF_CONFIG` or the XDG location. A default file is written
    /// there first if none exists.
    pub fn from_env(overlay: O) -> anyhow::Result<Self> {
        let path =
            VlfConfig::write_default_if_missing().context("failed to write default config")?;
        let config = VlfConfig::load()
            .with_context(|| format!("failed to load config {}", path.display()))?;
        Self::from_config(config, overlay)
    }

    pub fn subscribe_presence(&self) -> broadcast::Receiver<PresenceEvent> {
        self.registry.subscribe()
    }

    pub fn subscribe_connections(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.dispatcher.subscribe()
    }

    /// Run until shutdown is signalled or every event sender is gone.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<HostEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let presence_period = self.config.presence.probe_interval();
        let search_period = self.config.presence.search_interval();
        let reconnect_period = self.config.network.reconnect_interval();

        let start = Instant::now();
        let mut presence = time::interval_at(start + presence_period, presence_period);
        let mut search = time::interval_at(start + search_period, search_period);
        let mut reconnect = time::interval_at(start + reconnect_period, reconnect_period);
        for interval in [&mut presence, &mut search, &mut reconnect] {
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        self.ping_bootstrap_nodes();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("control loop shutting down");
                    return Ok(());
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("event channel closed, control loop exiting");
                        return Ok(());
                    };
                    if self.handle(event) {
                        reconnect.reset();
                    }
                }

                _ = presence.tick() => self.presence_tick(),

                _ = search.tick() => {
                    self.registry.search_tick(&mut self.overlay);
                }

                _ = reconnect.tick(), if !self.connected => {
                    tracing::debug!("still disconnected, pinging bootstrap nodes");
                    self.ping_bootstrap_nodes();
                }
            }
        }
    }

    fn presence_tick(&mut self) {
        let at = now();
        let summary = self.registry.tick(at, &mut self.overlay);
        if summary.probed > 0 || summary.lost > 0 {
            tracing::debug!(probed = summary.probed, lost = summary.lost, "presence tick");
        }
        if let Some(timeout) = self.config.presence.locate_timeout() {
            self.dispatcher.expire(at, timeout);
        }
    }

    /// Handle one event. Returns `true` when the link just dropped and the
    /// reconnect timer has to restart.
    fn handle(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::PeerReachable { peer, addr } => {
                self.registry.on_peer_reachable(&peer, addr, now());
            }
            HostEvent::PeerLocated(located) => {
                self.registry.on_peer_located(&located.id, located.addr, &mut self.overlay);
                self.dispatcher.on_located(&located, &mut self.overlay);
            }
            HostEvent::PeerNotLocated { peer, candidates } => {
                self.dispatcher.on_not_located(&peer, &candidates);
            }
            HostEvent::IncomingConnection { service, peer } => {
                if !self
                    .directory
                    .answer(&service, peer, &self.registry, &mut self.overlay)
                {
                    self.dispatcher.refused(peer, &service);
                }
            }
            HostEvent::ConnectionStarted {
                service,
                peer,
                session,
            } => {
                self.directory.connection_started(&service, &peer, session);
            }
            HostEvent::ConnectionFailed {
                service,
                peer,
                session,
                reason,
            } => {
                self.directory.connection_failed(&service, &peer, session);
                if let Some(kind) = ConnectionKind::from_service_name(&service) {
                    self.dispatcher.handshake_failed(peer, kind, &reason);
                }
            }
            HostEvent::Connected => {
                if !self.connected {
                    tracing::info!("connected to the overlay");
                }
                self.connected = true;
            }
            HostEvent::Disconnected => {
                let was_connected = self.connected;
                self.connected = false;
                if was_connected {
                    tracing::info!("disconnected from the overlay, rejoining");
                    self.ping_bootstrap_nodes();
                    return true;
                }
            }

            HostEvent::Chat(peer) => self.connect(peer, SessionPayload::chat()),
            HostEvent::Call(peer) => self.connect(peer, SessionPayload::call()),
            HostEvent::SendFile { peer, path } => self.connect(peer, SessionPayload::upload(path)),
            HostEvent::Cancel(peer) => {
                self.dispatcher.cancel(&peer);
            }
            HostEvent::AddBuddy { name, peer } => {
                self.registry.add_buddy(&name, peer);
            }
            HostEvent::DelBuddy(name) => {
                self.registry.del_buddy(&name);
            }
            HostEvent::AddNode { name, peer } => {
                self.registry.add_node(&name, peer, None);
            }
            HostEvent::DelNode { name, peer } => {
                self.registry.del_node(&name, &peer);
            }
            HostEvent::Bootstrap(entry) => self.add_bootstrap_node(&entry),
            HostEvent::UpdateSettings(settings) => self.update_settings(settings),
            HostEvent::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
        false
    }

    fn connect(&mut self, peer: PeerId, payload: SessionPayload) {
        if let Err(RequestError::Busy { peer, payload }) =
            self.dispatcher.request(peer, payload, now(), &mut self.overlay)
        {
            tracing::warn!(peer = %peer, kind = %payload.kind(), "connection already pending, request dropped");
        }
    }

    fn add_bootstrap_node(&mut self, entry: &str) {
        let Some((host, port)) = parse_host_port(entry, self.config.network.default_bootstrap_port)
        else {
            tracing::warn!(entry, "malformed bootstrap node");
            return;
        };
        tracing::info!(host = %host, port, "bootstrapping");
        self.overlay.ping_host(&host, port);
        self.bootstrap.insert(&host, port);
    }

    fn ping_bootstrap_nodes(&mut self) {
        for (host, port) in self.bootstrap.iter() {
            self.overlay.ping_host(host, port);
        }
    }

    fn update_settings(&mut self, settings: Settings) {
        let path = self.config.storage.settings_path();
        if let Err(e) = settings.save(&path) {
            tracing::warn!(error = %e, "failed to persist settings");
        }
        tracing::info!(
            socks = settings.socks_service.enabled,
            upnp = settings.upnp.enabled,
            "settings updated"
        );
        self.directory.set_socks(settings.socks_service);
    }

    fn status(&self) -> HostStatus {
        HostStatus {
            self_id: self.overlay.self_id().to_hex(),
            connected: self.connected,
            buddies: self.registry.len(),
            reachable_buddies: self.registry.reachable_count(now()),
            pending_connections: self.dispatcher.len(),
            bootstrap_nodes: self.bootstrap.len(),
            overlay: self.overlay.stats(),
        }
    }
}

/// Current time from the tokio clock, so a paused runtime controls it.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}
