//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one client session, unique within a gateway process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new(42);
        assert_eq!(format!("{}", id), "session-42");
    }

    #[test]
    fn test_session_id_equality() {
        assert_eq!(SessionId::new(1), SessionId::from(1));
        assert_ne!(SessionId::new(1), SessionId::new(2));
    }
}
