//! Connection services: who may open a channel to us, and for what.
//!
//! Every overlay service name the user can be reached on has a
//! [`ConnectionService`]. The [`ServiceDirectory`] looks the service up for
//! an inbound offer and answers it through the overlay.

use std::collections::HashMap;
use std::sync::Arc;

use vlf_core::settings::SocksServiceSettings;
use vlf_core::PeerId;

use crate::buddies::BuddyRegistry;
use crate::overlay::Overlay;
use crate::session::{ConnectionKind, SessionId, SessionPayload};

/// Name of the SOCKS exit service. Admission comes from the settings file.
pub const SOCKS_SERVICE: &str = "socks";

/// Contract between the directory and one service.
pub trait ConnectionService: Send + Sync {
    /// Overlay service name this service answers on.
    fn service_name(&self) -> &'static str;

    /// Local endpoint for an accepted inbound connection.
    fn new_session_payload(&self, peer: &PeerId) -> SessionPayload;

    fn allow_connection(&self, peer: &PeerId, buddies: &BuddyRegistry) -> bool;

    /// The handshake for `session` completed.
    fn connection_started(&self, peer: &PeerId, session: SessionId);

    /// The handshake for `session` failed.
    fn connection_failed(&self, peer: &PeerId, session: SessionId);
}

/// Text chat, buddies only.
#[derive(Debug, Default)]
pub struct ChatService;

impl ConnectionService for ChatService {
    fn service_name(&self) -> &'static str {
        ConnectionKind::Chat.service_name()
    }

    fn new_session_payload(&self, _peer: &PeerId) -> SessionPayload {
        SessionPayload::chat()
    }

    fn allow_connection(&self, peer: &PeerId, buddies: &BuddyRegistry) -> bool {
        buddies.has_node(peer)
    }

    fn connection_started(&self, peer: &PeerId, session: SessionId) {
        tracing::info!(peer = %peer, session = %session, "chat connected");
    }

    fn connection_failed(&self, peer: &PeerId, session: SessionId) {
        tracing::info!(peer = %peer, session = %session, "chat connection failed");
    }
}

/// Voice call, buddies only.
#[derive(Debug, Default)]
pub struct CallService;

impl ConnectionService for CallService {
    fn service_name(&self) -> &'static str {
        ConnectionKind::Call.service_name()
    }

    fn new_session_payload(&self, _peer: &PeerId) -> SessionPayload {
        SessionPayload::call()
    }

    fn allow_connection(&self, peer: &PeerId, buddies: &BuddyRegistry) -> bool {
        buddies.has_node(peer)
    }

    fn connection_started(&self, peer: &PeerId, session: SessionId) {
        tracing::info!(peer = %peer, session = %session, "call connected");
    }

    fn connection_failed(&self, peer: &PeerId, session: SessionId) {
        tracing::info!(peer = %peer, session = %session, "call connection failed");
    }
}

/// Maps service names to services and answers inbound offers.
pub struct ServiceDirectory {
    services: HashMap<&'static str, Arc<dyn ConnectionService>>,
    socks: SocksServiceSettings,
}

impl ServiceDirectory {
    fn new(socks: SocksServiceSettings) -> Self {
        Self {
            services: HashMap::new(),
            socks,
        }
    }

    /// Directory with the chat and call services registered.
    pub fn with_defaults(socks: SocksServiceSettings) -> Self {
        let mut directory = Self::new(socks);
        directory.register(Arc::new(ChatService));
        directory.register(Arc::new(CallService));
        directory
    }

    /// Register a service, replacing any service with the same name.
    pub fn register(&mut self, service: Arc<dyn ConnectionService>) {
        self.services.insert(service.service_name(), service);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ConnectionService>> {
        self.services.get(name)
    }

    pub fn set_socks(&mut self, socks: SocksServiceSettings) {
        self.socks = socks;
    }

    /// Answer an inbound offer for `service` from `peer`. Returns whether
    /// it was accepted.
    pub fn answer(
        &self,
        service: &str,
        peer: PeerId,
        buddies: &BuddyRegistry,
        overlay: &mut impl Overlay,
    ) -> bool {
        if service == SOCKS_SERVICE {
            if self.socks.admits(&peer, buddies.has_node(&peer)) {
                tracing::debug!(peer = %peer, "socks connection admitted");
                overlay.accept_connection(service, peer, None);
                return true;
            }
            overlay.reject_connection(service, peer);
            return false;
        }

        match self.services.get(service) {
            Some(svc) if svc.allow_connection(&peer, buddies) => {
                let payload = svc.new_session_payload(&peer);
                tracing::debug!(peer = %peer, service, session = %payload.id(), "inbound connection accepted");
                overlay.accept_connection(service, peer, Some(payload));
                true
            }
            Some(_) => {
                overlay.reject_connection(service, peer);
                false
            }
            None => {
                tracing::debug!(peer = %peer, service, "offer for unknown service");
                overlay.reject_connection(service, peer);
                false
            }
        }
    }

    /// Route a completed handshake to its service.
    pub fn connection_started(&self, service: &str, peer: &PeerId, session: SessionId) {
        if let Some(svc) = self.services.get(service) {
            svc.connection_started(peer, session);
        }
    }

    /// Route a failed handshake to its service.
    pub fn connection_failed(&self, service: &str, peer: &PeerId, session: SessionId) {
        if let Some(svc) = self.services.get(service) {
            svc.connection_failed(peer, session);
        }
    }
}
