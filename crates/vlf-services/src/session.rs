//! Session kinds: the local endpoints handed to the overlay once a peer
//! has been located.
//!
//! A [`SessionPayload`] is what a caller parks in the pending table: plain
//! data, cheap to hold. [`Session::open`] turns it into a live endpoint at
//! resolution time; for uploads that is when the file is opened.

use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use vlf_core::PeerId;

use crate::overlay::LocatedPeer;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Chat,
    Call,
    FileUpload,
}

impl ConnectionKind {
    /// Overlay service name used for the handshake.
    pub const fn service_name(self) -> &'static str {
        match self {
            ConnectionKind::Chat => "chat",
            ConnectionKind::Call => "call",
            ConnectionKind::FileUpload => "fileupload",
        }
    }

    pub fn from_service_name(name: &str) -> Option<Self> {
        match name {
            "chat" => Some(ConnectionKind::Chat),
            "call" => Some(ConnectionKind::Call),
            "fileupload" => Some(ConnectionKind::FileUpload),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

/// The endpoint a caller wants connected, before the peer is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPayload {
    Chat { id: SessionId },
    Call { id: SessionId },
    /// The file is not touched until the session is opened.
    FileUpload { id: SessionId, path: PathBuf },
}

impl SessionPayload {
    pub fn chat() -> Self {
        SessionPayload::Chat { id: SessionId::next() }
    }

    pub fn call() -> Self {
        SessionPayload::Call { id: SessionId::next() }
    }

    pub fn upload(path: impl Into<PathBuf>) -> Self {
        SessionPayload::FileUpload {
            id: SessionId::next(),
            path: path.into(),
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        match self {
            SessionPayload::Chat { .. } => ConnectionKind::Chat,
            SessionPayload::Call { .. } => ConnectionKind::Call,
            SessionPayload::FileUpload { .. } => ConnectionKind::FileUpload,
        }
    }

    pub fn id(&self) -> SessionId {
        match self {
            SessionPayload::Chat { id }
            | SessionPayload::Call { id }
            | SessionPayload::FileUpload { id, .. } => *id,
        }
    }
}

#[derive(Debug)]
pub struct ChatSession {
    pub id: SessionId,
    pub peer: LocatedPeer,
}

#[derive(Debug)]
pub struct CallSession {
    pub id: SessionId,
    pub peer: LocatedPeer,
}

#[derive(Debug)]
pub struct UploadSession {
    pub id: SessionId,
    pub peer: LocatedPeer,
    pub path: PathBuf,
    pub size: u64,
    pub file: File,
}

/// A live local endpoint, moved into the overlay with `start_connection`.
#[derive(Debug)]
pub enum Session {
    Chat(ChatSession),
    Call(CallSession),
    Upload(UploadSession),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),
}

impl Session {
    /// Build the endpoint for a located peer.
    pub fn open(payload: SessionPayload, peer: &LocatedPeer) -> Result<Self, SessionError> {
        let peer = *peer;
        match payload {
            SessionPayload::Chat { id } => Ok(Session::Chat(ChatSession { id, peer })),
            SessionPayload::Call { id } => Ok(Session::Call(CallSession { id, peer })),
            SessionPayload::FileUpload { id, path } => {
                let file = File::open(&path).map_err(|source| SessionError::OpenFailed {
                    path: path.clone(),
                    source,
                })?;
                let meta = file.metadata().map_err(|source| SessionError::OpenFailed {
                    path: path.clone(),
                    source,
                })?;
                if !meta.is_file() {
                    return Err(SessionError::NotAFile(path));
                }
                Ok(Session::Upload(UploadSession {
                    id,
                    peer,
                    path,
                    size: meta.len(),
                    file,
                }))
            }
        }
    }

    pub fn id(&self) -> SessionId {
        match self {
            Session::Chat(s) => s.id,
            Session::Call(s) => s.id,
            Session::Upload(s) => s.id,
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        match self {
            Session::Chat(_) => ConnectionKind::Chat,
            Session::Call(_) => ConnectionKind::Call,
            Session::Upload(_) => ConnectionKind::FileUpload,
        }
    }

    pub fn peer(&self) -> &PeerId {
        match self {
            Session::Chat(s) => &s.peer.id,
            Session::Call(s) => &s.peer.id,
            Session::Upload(s) => &s.peer.id,
        }
    }
}
