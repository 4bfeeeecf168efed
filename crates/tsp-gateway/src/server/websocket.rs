//! WebSocket client channel
//!
//! One JSON message per WebSocket frame. Text and binary frames are both
//! accepted; control frames are answered by axum and skipped here.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

use tsp_core::error::ChannelError;
use tsp_core::message::{ClientEvent, ClientMessage};
use tsp_core::traits::ClientChannel;

/// [`ClientChannel`] over an upgraded axum WebSocket
pub struct WebSocketChannel {
    socket: WebSocket,
    closed: bool,
}

impl WebSocketChannel {
    /// Wrap an upgraded socket
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl ClientChannel for WebSocketChannel {
    async fn recv(&mut self) -> Option<Result<ClientMessage, ChannelError>> {
        if self.closed {
            return None;
        }

        loop {
            let message = match self.socket.recv().await? {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!("WebSocket receive failed: {}", e);
                    self.closed = true;
                    return None;
                }
            };

            match message {
                Message::Text(text) => {
                    return Some(ClientMessage::from_slice(text.as_bytes()).map_err(Into::into));
                }
                Message::Binary(data) => {
                    return Some(ClientMessage::from_slice(&data).map_err(Into::into));
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, event: ClientEvent) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        let json = event.to_json().map_err(|e| ChannelError::Transport(e.to_string()))?;
        self.socket.send(Message::Text(json)).await.map_err(|e| {
            tracing::debug!("WebSocket send failed: {}", e);
            self.closed = true;
            ChannelError::Closed
        })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // The peer may already be gone
        let _ = self.socket.send(Message::Close(None)).await;
    }
}
