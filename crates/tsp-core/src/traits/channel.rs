//! Client channel traits

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::message::{ClientEvent, ClientMessage};

/// Duplex, message-oriented connection to one client
///
/// Implementations must make [`recv`](ClientChannel::recv) cancel-safe:
/// the session loop races it against backend reads.
#[async_trait]
pub trait ClientChannel: Send {
    /// Receive the next client message.
    ///
    /// Returns `None` once the client has disconnected. A
    /// [`ChannelError::Decode`] means one message was unreadable but the
    /// channel is still open.
    async fn recv(&mut self) -> Option<Result<ClientMessage, ChannelError>>;

    /// Send an event to the client
    async fn send(&mut self, event: ClientEvent) -> Result<(), ChannelError>;

    /// Close the channel gracefully
    async fn close(&mut self) {}
}

/// In-process client channel backed by tokio mpsc queues
pub struct MemoryChannel {
    inbound: mpsc::Receiver<Result<ClientMessage, ChannelError>>,
    outbound: mpsc::Sender<ClientEvent>,
}

/// The client side of a [`MemoryChannel`]
pub struct MemoryPeer {
    tx: mpsc::Sender<Result<ClientMessage, ChannelError>>,
    rx: mpsc::Receiver<ClientEvent>,
}

/// Create a connected in-memory channel pair
pub fn memory_channel(capacity: usize) -> (MemoryChannel, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::channel(capacity);
    let (out_tx, out_rx) = mpsc::channel(capacity);

    (
        MemoryChannel {
            inbound: in_rx,
            outbound: out_tx,
        },
        MemoryPeer {
            tx: in_tx,
            rx: out_rx,
        },
    )
}

#[async_trait]
impl ClientChannel for MemoryChannel {
    async fn recv(&mut self) -> Option<Result<ClientMessage, ChannelError>> {
        self.inbound.recv().await
    }

    async fn send(&mut self, event: ClientEvent) -> Result<(), ChannelError> {
        self.outbound
            .send(event)
            .await
            .map_err(|_| ChannelError::Closed)
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

impl MemoryPeer {
    /// Send a message to the gateway side
    pub async fn send(&self, message: ClientMessage) -> Result<(), ChannelError> {
        self.tx
            .send(Ok(message))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Deliver an undecodable message to the gateway side
    pub async fn send_invalid(&self, reason: impl Into<String>) -> Result<(), ChannelError> {
        self.tx
            .send(Err(ChannelError::Decode(reason.into())))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Receive the next event, `None` once the gateway side is gone
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }
}
