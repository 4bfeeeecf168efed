//! Packet header encoding/decoding
//!
//! Every packet starts with a fixed 28-byte header, all integers big-endian:
//! - tag: 1 byte (always `0x02`)
//! - method: 1 byte (high nibble zero, low nibble is the method code)
//! - resource: 2 bytes (u16)
//! - sequence: 2 bytes (u16, index of this packet within its request)
//! - total_sequences: 2 bytes (u16, packets composing the request)
//! - request_id: 16 bytes (opaque)
//! - payload_length: 4 bytes (u32)
//!
//! followed by `payload_length` bytes of payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;
use crate::request_id::{RequestId, REQUEST_ID_LEN};

/// Size of the packet header in bytes
pub const HEADER_SIZE: usize = 28;

/// Fixed first byte of every packet
pub const PACKET_TAG: u8 = 0x02;

/// Default cap on a single packet's payload (16MB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// 4-bit operation code carried in the low nibble of the method byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Method(u8);

impl Method {
    /// Largest representable method code
    pub const MAX: u8 = 0x0F;

    /// Create a method, returning None if the code does not fit in 4 bits
    pub fn new(code: u8) -> Option<Self> {
        (code <= Self::MAX).then_some(Self(code))
    }

    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Method {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Method::new(code).ok_or_else(|| format!("method must be 0-15, got {}", code))
    }
}

impl From<Method> for u8 {
    fn from(method: Method) -> u8 {
        method.0
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet header containing routing, sequencing and length information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Operation kind
    pub method: Method,
    /// Target resource
    pub resource: u16,
    /// Index of this packet within its request
    pub sequence: u16,
    /// Number of packets composing the request
    pub total_sequences: u16,
    /// Request this packet belongs to
    pub request_id: RequestId,
    /// Length of the payload in bytes
    pub payload_length: u32,
}

impl PacketHeader {
    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u8(PACKET_TAG);
        dst.put_u8(self.method.as_u8());
        dst.put_u16(self.resource);
        dst.put_u16(self.sequence);
        dst.put_u16(self.total_sequences);
        dst.put_slice(self.request_id.as_bytes());
        dst.put_u32(self.payload_length);
    }

    /// Decode a header from the start of `src`.
    ///
    /// Only the first [`HEADER_SIZE`] bytes are read and `src` itself is
    /// left untouched; the caller decides how far to advance.
    pub fn decode(src: &[u8]) -> Result<Self, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Err(ProtocolError::MalformedHeader {
                available: src.len(),
            });
        }

        let mut buf = &src[..HEADER_SIZE];

        let tag = buf.get_u8();
        if tag != PACKET_TAG {
            return Err(ProtocolError::InvalidTag(tag));
        }

        let method_byte = buf.get_u8();
        let method = Method::new(method_byte).ok_or(ProtocolError::InvalidMethod(method_byte))?;

        let resource = buf.get_u16();
        let sequence = buf.get_u16();
        let total_sequences = buf.get_u16();

        let mut id = [0u8; REQUEST_ID_LEN];
        buf.copy_to_slice(&mut id);

        let payload_length = buf.get_u32();

        Ok(Self {
            method,
            resource,
            sequence,
            total_sequences,
            request_id: RequestId::from_bytes(id),
            payload_length,
        })
    }
}

/// A fully received packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Decoded header
    pub header: PacketHeader,
    /// Payload, exactly `header.payload_length` bytes
    pub payload: Bytes,
}

impl Packet {
    /// Build a packet, deriving `payload_length` from the payload
    pub fn new(
        request_id: RequestId,
        method: Method,
        resource: u16,
        sequence: u16,
        total_sequences: u16,
        payload: impl Into<Bytes>,
    ) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        let payload_length =
            u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: u32::MAX as usize,
            })?;

        Ok(Self {
            header: PacketHeader {
                method,
                resource,
                sequence,
                total_sequences,
                request_id,
                payload_length,
            },
            payload,
        })
    }

    /// Request this packet belongs to
    pub fn request_id(&self) -> RequestId {
        self.header.request_id
    }

    /// Total encoded size (header plus payload)
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode header and payload into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        self.header.encode(dst);
        dst.extend_from_slice(&self.payload);
    }
}

/// A packet whose header has been decoded but whose payload is still arriving
#[derive(Debug)]
pub struct PendingPacket {
    header: PacketHeader,
    payload: BytesMut,
}

impl PendingPacket {
    /// Start accumulating a packet with an empty payload
    pub fn new(header: PacketHeader) -> Self {
        Self {
            header,
            payload: BytesMut::new(),
        }
    }

    /// The decoded header
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// Payload bytes accumulated so far
    pub fn received(&self) -> usize {
        self.payload.len()
    }

    /// Payload bytes still missing
    pub fn remaining(&self) -> usize {
        self.header.payload_length as usize - self.payload.len()
    }

    /// Whether the full payload has arrived
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Move as many payload bytes as are still needed out of `src`.
    ///
    /// Returns the number of bytes consumed.
    pub fn fill_from(&mut self, src: &mut BytesMut) -> usize {
        let take = self.remaining().min(src.len());
        if take > 0 {
            if self.payload.is_empty() && take == self.remaining() {
                // Whole payload already buffered: take it without copying.
                self.payload = src.split_to(take);
            } else {
                self.payload.extend_from_slice(&src[..take]);
                src.advance(take);
            }
        }
        take
    }

    /// Finish the packet. The caller must have checked [`is_complete`](Self::is_complete).
    pub fn into_packet(self) -> Packet {
        debug_assert!(self.is_complete());
        Packet {
            header: self.header,
            payload: self.payload.freeze(),
        }
    }
}
