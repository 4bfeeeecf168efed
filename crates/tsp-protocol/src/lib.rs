//! tsp-protocol: Wire protocol for the TSP gateway
//!
//! This crate defines the binary packet format spoken by the backend
//! router, the reassembly state machine that turns an arbitrarily chunked
//! byte stream back into packets, and the multiplexer that folds packets
//! into complete requests by request identifier.

pub mod codec;
pub mod error;
pub mod multiplexer;
pub mod packet;
pub mod reassembly;
pub mod request_id;

pub use codec::{encode_request, OutboundRequest, PacketCodec};
pub use error::ProtocolError;
pub use multiplexer::{Request, RequestMultiplexer};
pub use packet::{
    Method, Packet, PacketHeader, PendingPacket, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, PACKET_TAG,
};
pub use reassembly::{Packets, ReassemblyStream};
pub use request_id::RequestId;
