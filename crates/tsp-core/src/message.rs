//! Client message schema
//!
//! Clients talk to the gateway with JSON messages, one per WebSocket frame.
//! Every request and response carries its `request_id` explicitly, so a
//! single channel can carry any number of concurrent requests.
//!
//! Payloads are opaque bytes encoded as hex strings.
//!
//! ```text
//! client → gateway  {"type":"request","request_id":"0011…eeff","method":2,"resource":7,"payload":"dead"}
//! gateway → client  {"type":"response","request_id":"0011…eeff","method":2,"resource":7,"payload":"beef"}
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use tsp_protocol::{Method, OutboundRequest, Request, RequestId};

use crate::serde_utils::hex_bytes;

/// Message from a client to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Forward a request to the backend
    Request(ClientRequest),

    /// Keepalive
    Ping,
}

impl ClientMessage {
    /// Deserialize from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A request as sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Correlation token, 32 hex characters
    pub request_id: RequestId,
    /// Operation kind (0-15)
    pub method: Method,
    /// Target resource
    pub resource: u16,
    /// Opaque payload
    #[serde(default, with = "hex_bytes")]
    pub payload: Bytes,
}

impl From<ClientRequest> for OutboundRequest {
    fn from(req: ClientRequest) -> Self {
        OutboundRequest {
            request_id: req.request_id,
            method: req.method,
            resource: req.resource,
            payload: req.payload,
        }
    }
}

/// Event pushed from the gateway to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A complete backend response
    Response(ClientResponse),

    /// Something went wrong
    Error {
        /// Request the error relates to, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        /// Machine-readable category
        kind: ErrorKind,
        /// Human-readable message
        message: String,
    },

    /// Keepalive reply
    Pong,
}

impl ClientEvent {
    /// Build an error event not tied to a request
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ClientEvent::Error {
            request_id: None,
            kind,
            message: message.into(),
        }
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A complete response, addressed by request id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientResponse {
    /// Correlation token of the originating request
    pub request_id: RequestId,
    /// Method of the response
    pub method: Method,
    /// Resource of the response
    pub resource: u16,
    /// Concatenated payload of every response packet
    #[serde(with = "hex_bytes")]
    pub payload: Bytes,
}

impl From<Request> for ClientResponse {
    fn from(request: Request) -> Self {
        Self {
            payload: request.payload(),
            request_id: request.request_id,
            method: request.method,
            resource: request.resource,
        }
    }
}

/// Error categories reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend could not be reached or written to; the session ends
    BackendUnavailable,
    /// The backend closed its connection; the session ends
    BackendClosed,
    /// The backend sent bytes that could not be parsed; the session ends
    MalformedStream,
    /// The client message was rejected; the session continues
    InvalidMessage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::BackendUnavailable => write!(f, "backend_unavailable"),
            ErrorKind::BackendClosed => write!(f, "backend_closed"),
            ErrorKind::MalformedStream => write!(f, "malformed_stream"),
            ErrorKind::InvalidMessage => write!(f, "invalid_message"),
        }
    }
}

/// Gateway status reported by the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    /// Whether the gateway is running
    pub running: bool,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Sessions currently open
    pub active_sessions: usize,
    /// Sessions opened since start
    pub total_sessions: u64,
    /// Backend every session connects to
    pub backend_address: String,
    /// Gateway version
    pub version: String,
}

/// Connection details served at `/server`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Scheme, `http` or `https`
    pub protocol: String,
    /// Host clients should connect to
    pub host: String,
    /// Port clients should connect to
    pub port: String,
    /// Client transport options
    pub client_args: ClientArgs,
}

/// Client transport options advertised with [`ServerInfo`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientArgs {
    /// Whether clients may upgrade their transport
    pub upgrade: bool,
}
