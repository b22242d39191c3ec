//! Error types for the outer layers (network, shop, storage).
//!
//! The simulation tick itself never fails: bad states are skipped or clamped
//! in place. These errors cover the surfaces where a caller can react.

use std::fmt;

/// Peer-channel failures.
#[derive(Debug, Clone, PartialEq)]
pub enum NetError {
    /// Room creation or join did not complete in time.
    ConnectTimeout {
        /// Room that was being joined, `None` while creating one.
        room: Option<String>,
    },
    /// The generated room id is already registered with the broker.
    RoomIdTaken,
    /// The remote side refused the connection.
    Rejected(String),
    /// An inbound payload failed to parse or validate.
    Malformed(String),
    /// An outbound message could not be serialized.
    Encode(String),
}

impl NetError {
    /// Connection failures are surfaced to the initiating action; the caller
    /// may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetError::ConnectTimeout { .. } | NetError::RoomIdTaken | NetError::Rejected(_)
        )
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::ConnectTimeout { room: Some(room) } => {
                write!(f, "timed out joining room {room}")
            }
            NetError::ConnectTimeout { room: None } => write!(f, "timed out creating room"),
            NetError::RoomIdTaken => write!(f, "room id already taken"),
            NetError::Rejected(reason) => write!(f, "connection rejected: {reason}"),
            NetError::Malformed(reason) => write!(f, "malformed payload: {reason}"),
            NetError::Encode(reason) => write!(f, "failed to encode message: {reason}"),
        }
    }
}

impl std::error::Error for NetError {}

/// Arsenal purchase failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopError {
    InsufficientShards { need: u32, have: u32 },
    MaxLevel,
    /// Dead players cannot shop.
    PlayerDead,
    /// Revive target is unknown or not dead.
    NoSuchTarget(String),
}

impl fmt::Display for ShopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShopError::InsufficientShards { need, have } => {
                write!(f, "need {need} shards, have {have}")
            }
            ShopError::MaxLevel => write!(f, "upgrade already at max level"),
            ShopError::PlayerDead => write!(f, "player is dead"),
            ShopError::NoSuchTarget(id) => write!(f, "no dead teammate with id {id}"),
        }
    }
}

impl std::error::Error for ShopError {}

/// Persistence failures. Never fatal to a run.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// No storage backend on this platform (e.g. LocalStorage disabled).
    Unavailable,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "storage I/O error: {e}"),
            StoreError::Parse(e) => write!(f, "stored data is corrupt: {e}"),
            StoreError::Unavailable => write!(f, "storage unavailable"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Parse(e) => Some(e),
            StoreError::Unavailable => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Parse(e)
    }
}
