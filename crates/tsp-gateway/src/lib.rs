//! tsp-gateway: Daemon bridging client WebSocket sessions to the backend router
//!
//! Each connected client gets its own session: one WebSocket, one backend
//! TCP connection, and a private reassembly/multiplexing state. Sessions
//! share nothing but the configuration.

pub mod server;
pub mod session;
pub mod state;

pub use server::GatewayServer;
pub use session::{SessionBridge, SessionEnd};
pub use state::GatewayState;
