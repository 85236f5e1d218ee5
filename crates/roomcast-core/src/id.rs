//! Connection identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RoomcastError;

/// 128-bit random token identifying one live connection.
///
/// Rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u128);

impl ConnectionId {
    /// All-zero id. Never produced by `random` in practice; used where an
    /// error must name a connection that was never registered.
    pub const NIL: ConnectionId = ConnectionId(0);

    /// Draw a fresh id from the thread-local CSPRNG.
    pub fn random() -> Self {
        Self(rand::random::<u128>())
    }

    pub const fn from_u128(v: u128) -> Self {
        Self(v)
    }

    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = RoomcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RoomcastError::BadRequest(format!(
                "connection id must be 32 hex chars, got {s:?}"
            )));
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| RoomcastError::BadRequest(format!("invalid connection id: {e}")))
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConnectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
