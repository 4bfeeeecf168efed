//! tsp-core: Core abstractions and configuration for the TSP gateway
//!
//! This crate provides the configuration structures, the JSON message
//! schema spoken with clients, the client-channel abstraction and the
//! error taxonomy shared by the gateway components.

pub mod config;
pub mod error;
pub mod message;
pub mod serde_utils;
pub mod traits;
pub mod types;

pub use error::GatewayError;
pub use types::SessionId;
