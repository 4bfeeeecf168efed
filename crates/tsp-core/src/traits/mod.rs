//! Core trait definitions

mod channel;

pub use channel::{memory_channel, ClientChannel, MemoryChannel, MemoryPeer};
