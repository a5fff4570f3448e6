//! Peer identifiers.
//!
//! A `PeerId` is the overlay's fixed-width node identifier. It is opaque:
//! the only operations are equality, hashing and the hex text form used in
//! every file vlf writes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Width of an overlay identifier in bytes.
pub const PEER_ID_LEN: usize = 20;

/// Opaque overlay node identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; PEER_ID_LEN]);

impl PeerId {
    pub const fn from_bytes(bytes: [u8; PEER_ID_LEN]) -> Self {
        PeerId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PEER_ID_LEN] {
        &self.0
    }

    /// Parse the lowercase or uppercase hex form.
    pub fn from_hex(text: &str) -> Result<Self, IdError> {
        let bytes = hex::decode(text.trim()).map_err(|_| IdError::NotHex(text.to_string()))?;
        let len = bytes.len();
        let bytes: [u8; PEER_ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdError::WrongLength(len))?;
        Ok(PeerId(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short())
    }
}

impl FromStr for PeerId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeerId::from_hex(s)
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        PeerId::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("not a hex string: {0:?}")]
    NotHex(String),
    #[error("expected 20 bytes, got {0}")]
    WrongLength(usize),
}
