//! Core error types for the TSP gateway

use std::path::PathBuf;
use thiserror::Error;
use tsp_protocol::ProtocolError;

/// Top-level error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Client channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a client session
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backend could not be reached, or a write to it failed
    #[error("Backend unavailable at {address}: {source}")]
    BackendUnavailable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend byte stream could not be parsed
    #[error("Malformed backend stream: {0}")]
    Protocol(#[from] ProtocolError),

    /// The client channel failed
    #[error("Client channel failed: {0}")]
    Channel(#[from] ChannelError),
}

/// Client channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The peer is gone
    #[error("Channel closed")]
    Closed,

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// A message could not be decoded; the channel itself is still usable
    #[error("Invalid message: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        ChannelError::Decode(e.to_string())
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Refused to overwrite an existing config file
    #[error("Config file already exists: {0}")]
    AlreadyExists(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
