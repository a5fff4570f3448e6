//! vlf-services: buddy presence and outgoing connection dispatch.
//!
//! Everything here is host-driven and single-threaded: the host owns a
//! [`BuddyRegistry`] and a [`ConnectionDispatcher`], feeds them overlay
//! events and timer ticks, and hands them an [`Overlay`] to issue
//! fire-and-forget requests on.

pub mod buddies;
pub mod dispatch;
pub mod events;
pub mod overlay;
pub mod pending;
pub mod presence;
pub mod service;
pub mod session;

pub use buddies::{BuddyRecord, BuddyRegistry, StoreError, TickSummary};
pub use dispatch::ConnectionDispatcher;
pub use events::{ConnectionEvent, PresenceEvent};
pub use overlay::{LocatedPeer, Overlay, OverlayStats};
pub use pending::{PendingConnection, PendingConnectionTable, RequestError};
pub use presence::{Buddy, PresenceEntry, Sighting, LOSS_TIMEOUT, PROBE_THRESHOLD};
pub use service::{CallService, ChatService, ConnectionService, ServiceDirectory, SOCKS_SERVICE};
pub use session::{
    CallSession, ChatSession, ConnectionKind, Session, SessionError, SessionId, SessionPayload,
    UploadSession,
};
