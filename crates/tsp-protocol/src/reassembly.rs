//! Inbound byte-stream reassembly
//!
//! The backend connection delivers bytes in whatever chunks the socket
//! hands us. A packet's header or payload may be split across any number
//! of reads, and a single read may carry several packets.
//! [`ReassemblyStream`] buffers the unconsumed bytes, keeps at most one
//! partially received packet, and yields completed packets in arrival
//! order.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tsp_protocol::{encode_request, Method, ReassemblyStream, RequestId};
//!
//! let id: RequestId = "00112233445566778899aabbccddeeff".parse().unwrap();
//! let mut wire = BytesMut::new();
//! encode_request(id, Method::new(2).unwrap(), 7, &[0xDE, 0xAD], &mut wire).unwrap();
//!
//! let mut stream = ReassemblyStream::new();
//! stream.push(&wire[..15]);
//! assert_eq!(stream.packets().count(), 0);
//!
//! stream.push(&wire[15..]);
//! let packets: Vec<_> = stream.packets().collect::<Result<_, _>>().unwrap();
//! assert_eq!(packets.len(), 1);
//! assert_eq!(&packets[0].payload[..], &[0xDE, 0xAD]);
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::PacketCodec;
use crate::error::ProtocolError;
use crate::packet::{Packet, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};

/// Turns an arbitrarily chunked byte stream into complete packets
#[derive(Debug)]
pub struct ReassemblyStream {
    /// Decoder holding the single in-flight packet
    codec: PacketCodec,
    /// Bytes received but not yet consumed by the decoder
    buffer: BytesMut,
    /// Number of packets yielded so far
    emitted: u64,
}

impl ReassemblyStream {
    /// Create a stream with the default payload limit
    pub fn new() -> Self {
        Self::with_max_payload_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a stream rejecting packets whose payload exceeds `max_payload_size`
    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self {
            codec: PacketCodec::with_max_payload_size(max_payload_size),
            buffer: BytesMut::new(),
            emitted: 0,
        }
    }

    /// Append a chunk read from the backend
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pull the next completed packet, if the buffered bytes contain one.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Bytes that do not yet
    /// form a packet stay buffered for the next call.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, ProtocolError> {
        let packet = self.codec.decode(&mut self.buffer)?;
        if packet.is_some() {
            self.emitted += 1;
        }
        Ok(packet)
    }

    /// Lazily iterate over the packets completed by the bytes pushed so far.
    ///
    /// The iterator ends when more input is needed, or right after yielding
    /// an error. Dropping it early loses nothing: unconsumed bytes remain
    /// buffered.
    pub fn packets(&mut self) -> Packets<'_> {
        Packets {
            stream: self,
            done: false,
        }
    }

    /// Bytes held for a packet that has not completed yet
    pub fn buffered(&self) -> usize {
        let in_flight = self
            .codec
            .pending()
            .map(|p| HEADER_SIZE + p.received())
            .unwrap_or(0);
        in_flight + self.buffer.len()
    }

    /// Whether the stream sits exactly on a packet boundary
    pub fn is_idle(&self) -> bool {
        self.buffered() == 0
    }

    /// Number of packets yielded over the lifetime of the stream
    pub fn packets_emitted(&self) -> u64 {
        self.emitted
    }

    /// Declare the end of input.
    ///
    /// Fails with [`ProtocolError::Truncated`] if a partial header or
    /// payload is still buffered.
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        let buffered = self.buffered();
        self.codec.reset();
        self.buffer.clear();

        if buffered == 0 {
            Ok(())
        } else {
            Err(ProtocolError::Truncated { buffered })
        }
    }
}

impl Default for ReassemblyStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over packets completed by the currently buffered bytes
pub struct Packets<'a> {
    stream: &'a mut ReassemblyStream,
    done: bool,
}

impl Iterator for Packets<'_> {
    type Item = Result<Packet, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.stream.next_packet() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Packets<'_> {}
