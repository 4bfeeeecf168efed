//! Per-client sessions
//!
//! Each client connection gets one [`SessionBridge`], which owns the
//! client channel, one backend connection and all protocol state for the
//! session.

mod backend;
mod bridge;
mod state;

pub use backend::connect_backend;
pub use bridge::{SessionBridge, SessionEnd};
pub use state::{SessionState, Teardown};
