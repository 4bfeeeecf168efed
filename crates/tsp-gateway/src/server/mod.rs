//! HTTP and WebSocket front end
//!
//! Accepts client connections and spawns a session for each.

mod listener;
mod websocket;

pub use listener::GatewayServer;
pub use websocket::WebSocketChannel;
