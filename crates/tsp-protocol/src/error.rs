//! Protocol error types

use thiserror::Error;

use crate::request_id::RequestId;

/// Errors that can occur while encoding, reassembling or correlating packets
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Fewer than a full header's worth of bytes were available to decode
    #[error("Malformed header: expected 28 bytes, got {available}")]
    MalformedHeader { available: usize },

    /// The header did not start with the fixed tag byte
    #[error("Invalid packet tag: 0x{0:02x}")]
    InvalidTag(u8),

    /// The method byte had bits set outside the low nibble
    #[error("Invalid method byte: 0x{0:02x}")]
    InvalidMethod(u8),

    /// Payload exceeds maximum size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// A packet arrived for a request that was never registered
    #[error("Unknown request id: {0}")]
    UnknownRequestId(RequestId),

    /// A packet's sequence numbering is inconsistent with its request
    #[error("Invalid sequence {sequence}/{total_sequences} for request {request_id}")]
    InvalidSequence {
        request_id: RequestId,
        sequence: u16,
        total_sequences: u16,
    },

    /// The stream ended in the middle of a packet
    #[error("Stream truncated with {buffered} bytes of an incomplete packet buffered")]
    Truncated { buffered: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error leaves the byte stream unusable.
    ///
    /// Correlation faults only concern a single packet; the framing is still
    /// intact and the session can keep reading. Everything else means the
    /// stream position can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::UnknownRequestId(_) | ProtocolError::InvalidSequence { .. }
        )
    }
}
