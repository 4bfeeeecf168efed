//! Request multiplexing over a single backend connection
//!
//! Many requests share one backend connection; their packets are told apart
//! by request id. The multiplexer keeps a table of requests the client has
//! registered, collects the packets addressed to each, and hands back a
//! [`Request`] the moment its last packet arrives.
//!
//! Completion is decided by count: a request is done once it holds as many
//! packets as the first packet's `total_sequences`. Packets are kept in
//! arrival order and the backend is trusted to send them in sequence order.
//! Strict sequencing can be switched on to verify that trust.

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

use crate::error::ProtocolError;
use crate::packet::{Method, Packet, PacketHeader};
use crate::request_id::RequestId;

/// A fully received request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Correlation token
    pub request_id: RequestId,
    /// Method of the first packet collected
    pub method: Method,
    /// Resource of the first packet collected
    pub resource: u16,
    /// Packets in arrival order
    pub packets: Vec<Packet>,
}

impl Request {
    /// Concatenated payload of all packets, in arrival order
    pub fn payload(&self) -> Bytes {
        match self.packets.as_slice() {
            [only] => only.payload.clone(),
            packets => {
                let len = packets.iter().map(|p| p.payload.len()).sum();
                let mut buf = BytesMut::with_capacity(len);
                for packet in packets {
                    buf.extend_from_slice(&packet.payload);
                }
                buf.freeze()
            }
        }
    }
}

/// Correlates packets into requests by request id
#[derive(Debug, Default)]
pub struct RequestMultiplexer {
    /// Registered requests still waiting for packets
    pending: HashMap<RequestId, Vec<Packet>>,
    /// Require packets to arrive as 0, 1, 2, ... with a consistent total
    strict_sequencing: bool,
}

impl RequestMultiplexer {
    /// Create a multiplexer using count-based completion only
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a multiplexer that also validates sequence numbers
    pub fn with_strict_sequencing(strict_sequencing: bool) -> Self {
        Self {
            pending: HashMap::new(),
            strict_sequencing,
        }
    }

    /// Register an outbound request so its response packets can be correlated.
    ///
    /// Returns `true` if a pending request with the same id was replaced;
    /// any packets it had collected are discarded.
    pub fn register(&mut self, request_id: RequestId) -> bool {
        match self.pending.insert(request_id, Vec::new()) {
            Some(previous) => {
                tracing::warn!(
                    %request_id,
                    discarded_packets = previous.len(),
                    "Request id re-registered while still pending"
                );
                true
            }
            None => false,
        }
    }

    /// Fold one packet into its request.
    ///
    /// Returns the completed request when this packet was its last one.
    /// A packet for an unregistered id fails with
    /// [`ProtocolError::UnknownRequestId`] and leaves the table untouched.
    pub fn accept(&mut self, packet: Packet) -> Result<Option<Request>, ProtocolError> {
        let request_id = packet.request_id();

        let Some(packets) = self.pending.get_mut(&request_id) else {
            return Err(ProtocolError::UnknownRequestId(request_id));
        };

        check_sequence(
            &packet.header,
            packets.first().map(|p| &p.header),
            packets.len(),
            self.strict_sequencing,
        )?;

        packets.push(packet);

        let expected = packets
            .first()
            .map(|p| p.header.total_sequences as usize)
            .unwrap_or(0);
        if packets.len() < expected {
            return Ok(None);
        }

        let Some(packets) = self.pending.remove(&request_id) else {
            return Ok(None);
        };
        let Some(first) = packets.first().map(|p| p.header) else {
            return Ok(None);
        };

        tracing::trace!(%request_id, packets = packets.len(), "Request complete");

        Ok(Some(Request {
            request_id,
            method: first.method,
            resource: first.resource,
            packets,
        }))
    }

    /// Whether a request with this id is pending
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending request, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

fn check_sequence(
    header: &PacketHeader,
    first: Option<&PacketHeader>,
    collected: usize,
    strict: bool,
) -> Result<(), ProtocolError> {
    let invalid = || ProtocolError::InvalidSequence {
        request_id: header.request_id,
        sequence: header.sequence,
        total_sequences: header.total_sequences,
    };

    // A zero total could never complete and would sit in the table forever
    if header.total_sequences == 0 || header.sequence >= header.total_sequences {
        return Err(invalid());
    }

    if strict {
        if usize::from(header.sequence) != collected {
            return Err(invalid());
        }
        if first.is_some_and(|f| f.total_sequences != header.total_sequences) {
            return Err(invalid());
        }
    }

    Ok(())
}
