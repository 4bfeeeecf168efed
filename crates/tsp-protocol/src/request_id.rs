//! Request identifier type

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a request identifier on the wire
pub const REQUEST_ID_LEN: usize = 16;

/// Opaque 128-bit token correlating the packets of one request.
///
/// Only ever compared for equality; its bytes are never interpreted
/// numerically. The external representation is a 32-character hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId([u8; REQUEST_ID_LEN]);

/// Error returned when a request identifier string cannot be parsed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseRequestIdError {
    /// Wrong number of hex digits
    #[error("request id must be 32 hex characters, got {0}")]
    InvalidLength(usize),

    /// Non-hex character
    #[error("request id is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl RequestId {
    /// Create a request ID from its raw bytes
    pub const fn from_bytes(bytes: [u8; REQUEST_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; REQUEST_ID_LEN] {
        &self.0
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.to_hex())
    }
}

impl FromStr for RequestId {
    type Err = ParseRequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != REQUEST_ID_LEN * 2 {
            return Err(ParseRequestIdError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; REQUEST_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; REQUEST_ID_LEN]> for RequestId {
    fn from(bytes: [u8; REQUEST_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
