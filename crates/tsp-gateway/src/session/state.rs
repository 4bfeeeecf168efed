//! Protocol state owned by one session

use tsp_core::config::GatewayConfig;
use tsp_protocol::{ProtocolError, Request, RequestId, RequestMultiplexer, ReassemblyStream};

/// Everything a session knows about the backend conversation.
///
/// Owned by exactly one bridge task and never shared.
#[derive(Debug)]
pub struct SessionState {
    stream: ReassemblyStream,
    requests: RequestMultiplexer,
}

/// What was left behind when a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teardown {
    /// Requests that never received their full response
    pub abandoned_requests: usize,
    /// Bytes of a packet that never completed
    pub buffered_bytes: usize,
}

impl SessionState {
    /// Create empty state using the configured limits
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            stream: ReassemblyStream::with_max_payload_size(config.max_payload_size),
            requests: RequestMultiplexer::with_strict_sequencing(config.strict_sequencing),
        }
    }

    /// Track an outbound request so its response can be correlated
    pub fn register(&mut self, request_id: RequestId) {
        self.requests.register(request_id);
    }

    /// Feed a chunk of backend bytes, appending every request it completes.
    ///
    /// Per-packet faults (unknown id, bad sequence) are logged and the
    /// packet dropped. Anything else is returned and the stream is no longer
    /// usable.
    pub fn ingest(
        &mut self,
        chunk: &[u8],
        completed: &mut Vec<Request>,
    ) -> Result<(), ProtocolError> {
        self.stream.push(chunk);

        for packet in self.stream.packets() {
            let packet = packet?;
            match self.requests.accept(packet) {
                Ok(Some(request)) => completed.push(request),
                Ok(None) => {}
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("Dropping backend packet: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Signal that the backend closed its side
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        self.stream.finish()
    }

    /// Number of requests waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Bytes held for a packet that has not completed yet
    pub fn buffered_bytes(&self) -> usize {
        self.stream.buffered()
    }

    /// Drop all state, reporting what was discarded
    pub fn teardown(&mut self) -> Teardown {
        let buffered_bytes = self.stream.buffered();
        // Teardown discards the partial packet either way
        let _ = self.stream.finish();

        Teardown {
            abandoned_requests: self.requests.clear(),
            buffered_bytes,
        }
    }
}
