//! Shared error type across roomcast crates.
//!
//! Only delivery-side and startup failures are errors. Lookups that miss
//! (unknown connection, absent group, unbound identity) are reported through
//! the status codes in [`crate::status`] or as empty results.

use thiserror::Error;

use crate::id::ConnectionId;

/// Stable error codes (safe to log or hand to clients).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Registered connection exposes no delivery capability.
    NoDeliveryCapability,
    /// Outbound queue of the connection is full.
    QueueFull,
    /// Outbound queue of the connection has been closed.
    ChannelClosed,
    /// Invalid input or configuration.
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal failure.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoDeliveryCapability => "NO_DELIVERY_CAPABILITY",
            ErrorCode::QueueFull => "QUEUE_FULL",
            ErrorCode::ChannelClosed => "CHANNEL_CLOSED",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RoomcastError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomcastError {
    #[error("connection {0} exposes no delivery capability")]
    NoDeliveryCapability(ConnectionId),
    #[error("outbound queue full for connection {0}")]
    QueueFull(ConnectionId),
    #[error("outbound channel closed for connection {0}")]
    ChannelClosed(ConnectionId),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl RoomcastError {
    /// Map to the stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomcastError::NoDeliveryCapability(_) => ErrorCode::NoDeliveryCapability,
            RoomcastError::QueueFull(_) => ErrorCode::QueueFull,
            RoomcastError::ChannelClosed(_) => ErrorCode::ChannelClosed,
            RoomcastError::BadRequest(_) => ErrorCode::BadRequest,
            RoomcastError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            RoomcastError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// An integration defect rather than a transient transport condition.
    pub fn is_hard_fault(&self) -> bool {
        matches!(self, RoomcastError::NoDeliveryCapability(_))
    }
}
