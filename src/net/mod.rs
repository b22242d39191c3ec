//! Peer-to-peer co-op
//!
//! - `protocol`: wire messages and the JSON codec
//! - `session`: host-authoritative reconciliation over an abstract channel
//! - `memory`: in-process loopback channel

pub mod memory;
pub mod protocol;
pub mod session;

pub use memory::{MemoryConnector, MemoryLink, MemoryNetwork};
pub use protocol::{NetMessage, decode, encode};
pub use session::{Connector, Messenger, NetSession, open_room};
