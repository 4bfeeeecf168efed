//! Process-wide gateway state
//!
//! Only configuration and counters live here. Protocol state belongs to
//! each session and is never shared.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tsp_core::config::GatewayConfig;
use tsp_core::message::GatewayStatus;
use tsp_core::SessionId;

/// Shared state for the gateway daemon
pub struct GatewayState {
    /// Configuration
    pub config: Arc<GatewayConfig>,
    /// When the gateway started
    start_time: Instant,
    /// Next session ID to allocate
    next_session_id: AtomicU64,
    /// Sessions currently open
    active_sessions: AtomicUsize,
}

impl GatewayState {
    /// Create new gateway state
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            next_session_id: AtomicU64::new(1),
            active_sessions: AtomicUsize::new(0),
        }
    }

    /// Allocate an ID for a new session and count it as active until the
    /// returned ticket is dropped
    pub fn open_session(self: &Arc<Self>) -> SessionTicket {
        let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::SeqCst));
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionTicket {
            id,
            state: Arc::clone(self),
        }
    }

    /// Number of sessions currently open
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Number of sessions opened since start
    pub fn total_sessions(&self) -> u64 {
        self.next_session_id.load(Ordering::SeqCst) - 1
    }

    /// Snapshot for the health endpoint
    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            running: true,
            uptime_secs: self.start_time.elapsed().as_secs(),
            active_sessions: self.active_sessions(),
            total_sessions: self.total_sessions(),
            backend_address: self.config.backend.address(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Marks a session as active for as long as it is alive
pub struct SessionTicket {
    id: SessionId,
    state: Arc<GatewayState>,
}

impl SessionTicket {
    /// The session's ID
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionTicket {
    fn drop(&mut self) {
        self.state.active_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_tickets() {
        let state = Arc::new(GatewayState::new(GatewayConfig::default()));

        let first = state.open_session();
        let second = state.open_session();
        assert_eq!(first.id(), SessionId::new(1));
        assert_eq!(second.id(), SessionId::new(2));
        assert_eq!(state.active_sessions(), 2);

        drop(first);
        assert_eq!(state.active_sessions(), 1);
        assert_eq!(state.total_sessions(), 2);

        drop(second);
        assert_eq!(state.active_sessions(), 0);
    }

    #[test]
    fn test_status() {
        let state = GatewayState::new(GatewayConfig::default());
        let status = state.status();

        assert!(status.running);
        assert_eq!(status.active_sessions, 0);
        assert_eq!(status.total_sessions, 0);
        assert_eq!(status.backend_address, "127.0.0.1:877");
    }
}
