//! Session bridge
//!
//! Relays between one client channel and one backend connection. Client
//! requests are encoded and written to the backend; backend bytes are
//! reassembled into packets, correlated by request id, and every completed
//! request is pushed back to the client as a response event.

use std::fmt;
use std::sync::Arc;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use tsp_core::config::GatewayConfig;
use tsp_core::error::{ChannelError, SessionError};
use tsp_core::message::{ClientEvent, ClientMessage, ClientRequest, ErrorKind};
use tsp_core::traits::ClientChannel;
use tsp_core::SessionId;
use tsp_protocol::{OutboundRequest, PacketCodec, ProtocolError};

use super::backend::connect_backend;
use super::state::SessionState;

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client went away
    ClientDisconnected,
    /// The backend closed its connection
    BackendClosed,
    /// The gateway is shutting down
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ClientDisconnected => write!(f, "client disconnected"),
            SessionEnd::BackendClosed => write!(f, "backend closed"),
            SessionEnd::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Bridges one client to one backend connection
pub struct SessionBridge<C> {
    /// Session identifier, for logging
    id: SessionId,
    /// Client side of the session
    client: C,
    /// Gateway configuration
    config: Arc<GatewayConfig>,
    /// Cancelled when the gateway shuts down
    cancel: CancellationToken,
}

impl<C: ClientChannel> SessionBridge<C> {
    /// Create a bridge for a freshly accepted client
    pub fn new(
        id: SessionId,
        client: C,
        config: Arc<GatewayConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            client,
            config,
            cancel,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Connect to the configured backend and relay until the session ends.
    ///
    /// If the backend cannot be reached the client receives a
    /// `backend_unavailable` error and the session ends. There is no retry.
    pub async fn run(mut self) -> Result<SessionEnd, SessionError> {
        let connected = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.client.close().await;
                return Ok(SessionEnd::Shutdown);
            }
            result = connect_backend(&self.config.backend) => result,
        };

        match connected {
            Ok(stream) => self.run_with_backend(stream).await,
            Err(e) => {
                tracing::warn!("{}", e);
                self.notify(ErrorKind::BackendUnavailable, e.to_string())
                    .await;
                self.client.close().await;
                Err(e)
            }
        }
    }

    /// Relay over an already established backend stream
    pub async fn run_with_backend<B>(mut self, backend: B) -> Result<SessionEnd, SessionError>
    where
        B: AsyncRead + AsyncWrite + Unpin + Send,
    {
        tracing::info!("Session {} started", self.id);

        let (mut reader, writer) = tokio::io::split(backend);
        let mut writer = FramedWrite::new(
            writer,
            PacketCodec::with_max_payload_size(self.config.max_payload_size),
        );
        let mut state = SessionState::new(&self.config);

        let result = match self.relay(&mut reader, &mut writer, &mut state).await {
            Err(SessionError::Channel(ChannelError::Closed)) => Ok(SessionEnd::ClientDisconnected),
            other => other,
        };

        if let Err(e) = &result {
            if let Some(kind) = error_kind(e) {
                self.notify(kind, e.to_string()).await;
            }
        }

        let teardown = state.teardown();
        match &result {
            Ok(end) => tracing::info!(
                abandoned_requests = teardown.abandoned_requests,
                buffered_bytes = teardown.buffered_bytes,
                "Session {} ended: {}",
                self.id,
                end
            ),
            Err(e) => tracing::warn!(
                abandoned_requests = teardown.abandoned_requests,
                buffered_bytes = teardown.buffered_bytes,
                "Session {} failed: {}",
                self.id,
                e
            ),
        }

        self.client.close().await;
        result
    }

    async fn relay<B>(
        &mut self,
        reader: &mut ReadHalf<B>,
        writer: &mut FramedWrite<WriteHalf<B>, PacketCodec>,
        state: &mut SessionState,
    ) -> Result<SessionEnd, SessionError>
    where
        B: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut buf = vec![0u8; self.config.read_buffer_size];
        let mut completed = Vec::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Ok(SessionEnd::Shutdown);
                }

                message = self.client.recv() => {
                    match message {
                        None => return Ok(SessionEnd::ClientDisconnected),
                        Some(Ok(ClientMessage::Ping)) => {
                            self.client.send(ClientEvent::Pong).await?;
                        }
                        Some(Ok(ClientMessage::Request(request))) => {
                            self.forward(request, writer, state).await?;
                        }
                        Some(Err(ChannelError::Decode(reason))) => {
                            tracing::debug!("Rejected client message: {}", reason);
                            self.client
                                .send(ClientEvent::error(ErrorKind::InvalidMessage, reason))
                                .await?;
                        }
                        Some(Err(e)) => return Err(e.into()),
                    }
                }

                read = reader.read(&mut buf) => {
                    let n = match read {
                        Ok(n) => n,
                        Err(source) => {
                            return Err(SessionError::BackendUnavailable {
                                address: self.config.backend.address(),
                                source,
                            });
                        }
                    };

                    if n == 0 {
                        if let Err(e) = state.finish() {
                            tracing::warn!("Backend closed mid-packet: {}", e);
                        }
                        self.client
                            .send(ClientEvent::error(
                                ErrorKind::BackendClosed,
                                "backend closed the connection",
                            ))
                            .await?;
                        return Ok(SessionEnd::BackendClosed);
                    }

                    tracing::trace!(bytes = n, "Backend chunk");
                    // Requests completed before a fatal error are still delivered
                    let ingested = state.ingest(&buf[..n], &mut completed);

                    for request in completed.drain(..) {
                        tracing::debug!(
                            request_id = %request.request_id,
                            packets = request.packets.len(),
                            "Response complete"
                        );
                        self.client.send(ClientEvent::Response(request.into())).await?;
                    }

                    ingested?;
                }
            }
        }
    }

    /// Register a client request and write it to the backend
    async fn forward<W>(
        &mut self,
        request: ClientRequest,
        writer: &mut FramedWrite<W, PacketCodec>,
        state: &mut SessionState,
    ) -> Result<(), SessionError>
    where
        W: AsyncWrite + Unpin,
    {
        let request_id = request.request_id;

        if request.payload.len() > self.config.max_payload_size {
            let e = ProtocolError::PayloadTooLarge {
                size: request.payload.len(),
                max: self.config.max_payload_size,
            };
            tracing::debug!(%request_id, "Rejected client request: {}", e);
            self.client
                .send(ClientEvent::Error {
                    request_id: Some(request_id),
                    kind: ErrorKind::InvalidMessage,
                    message: e.to_string(),
                })
                .await?;
            return Ok(());
        }

        tracing::debug!(
            %request_id,
            method = %request.method,
            resource = request.resource,
            len = request.payload.len(),
            "Forwarding request"
        );

        state.register(request_id);

        match writer.send(OutboundRequest::from(request)).await {
            Ok(()) => Ok(()),
            Err(ProtocolError::Io(source)) => Err(SessionError::BackendUnavailable {
                address: self.config.backend.address(),
                source,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort error event; the client may already be gone
    async fn notify(&mut self, kind: ErrorKind, message: String) {
        if let Err(e) = self.client.send(ClientEvent::error(kind, message)).await {
            tracing::debug!("Could not deliver {} error to client: {}", kind, e);
        }
    }
}

/// Error category reported to the client for a session failure
fn error_kind(error: &SessionError) -> Option<ErrorKind> {
    match error {
        SessionError::BackendUnavailable { .. } => Some(ErrorKind::BackendUnavailable),
        SessionError::Protocol(_) => Some(ErrorKind::MalformedStream),
        SessionError::Channel(_) => None,
    }
}
