//! Tokio codec for packets
//!
//! Outbound traffic is always a single packet per request; inbound packets
//! are decoded incrementally, with the payload accumulated as it arrives.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::packet::{
    Method, Packet, PacketHeader, PendingPacket, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
};
use crate::request_id::RequestId;

/// A client-originated request, sent to the backend as one packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Correlation token
    pub request_id: RequestId,
    /// Operation kind
    pub method: Method,
    /// Target resource
    pub resource: u16,
    /// Opaque payload
    pub payload: Bytes,
}

/// Encode a single-packet request (`sequence = 0`, `total_sequences = 1`)
pub fn encode_request(
    request_id: RequestId,
    method: Method,
    resource: u16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), ProtocolError> {
    let payload_length = u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    let header = PacketHeader {
        method,
        resource,
        sequence: 0,
        total_sequences: 1,
        request_id,
        payload_length,
    };

    dst.reserve(HEADER_SIZE + payload.len());
    header.encode(dst);
    dst.extend_from_slice(payload);

    Ok(())
}

/// Codec for encoding requests and decoding packets
#[derive(Debug)]
pub struct PacketCodec {
    /// Packet whose header is decoded but whose payload is incomplete
    pending: Option<PendingPacket>,
    /// Largest payload accepted in either direction
    max_payload_size: usize,
}

impl PacketCodec {
    /// Create a codec with the default payload limit
    pub fn new() -> Self {
        Self::with_max_payload_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a codec with a custom payload limit
    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self {
            pending: None,
            max_payload_size,
        }
    }

    /// Largest payload accepted
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// The in-flight packet, if a header has been read but not its full payload
    pub fn pending(&self) -> Option<&PendingPacket> {
        self.pending.as_ref()
    }

    /// Drop any partially received packet
    pub fn reset(&mut self) {
        self.pending = None;
    }

    fn check_payload_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            });
        }
        Ok(())
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A new header is only started once the previous packet is complete
        if self.pending.is_none() {
            if src.len() < HEADER_SIZE {
                return Ok(None); // Need more data
            }

            let header = PacketHeader::decode(&src[..])?;
            self.check_payload_size(header.payload_length as usize)?;
            src.advance(HEADER_SIZE);

            tracing::trace!(
                request_id = %header.request_id,
                sequence = header.sequence,
                total = header.total_sequences,
                len = header.payload_length,
                "Decoded packet header"
            );

            self.pending = Some(PendingPacket::new(header));
        }

        let Some(pending) = self.pending.as_mut() else {
            return Ok(None);
        };

        pending.fill_from(src);

        if !pending.is_complete() {
            return Ok(None);
        }

        Ok(self.pending.take().map(PendingPacket::into_packet))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(packet) = self.decode(src)? {
            return Ok(Some(packet));
        }

        let in_flight = self
            .pending
            .as_ref()
            .map(|p| HEADER_SIZE + p.received())
            .unwrap_or(0);
        let buffered = in_flight + src.len();

        if buffered == 0 {
            Ok(None)
        } else {
            Err(ProtocolError::Truncated { buffered })
        }
    }
}

impl Encoder<OutboundRequest> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, request: OutboundRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.check_payload_size(request.payload.len())?;

        encode_request(
            request.request_id,
            request.method,
            request.resource,
            &request.payload,
            dst,
        )
    }
}
