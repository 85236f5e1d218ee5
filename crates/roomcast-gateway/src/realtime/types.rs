use std::sync::Arc;

use axum::extract::ws::Message;
use bytes::Bytes;
use serde_json::Value;

/// Per-connection opaque data, stored at registration and returned unchanged.
pub type ConnData = Value;

/// Outgoing payload variants.
///
/// Routing never looks inside a payload; it is cloned once per recipient, which
/// is cheap for `Text` and `Binary`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON value, serialized by the transport adapter.
    Json(Value),
    /// UTF-8 text.
    Text(Arc<str>),
    /// Raw binary bytes.
    Binary(Bytes),
}

impl Payload {
    pub fn text(s: impl Into<Arc<str>>) -> Self {
        Payload::Text(s.into())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        Payload::Binary(b.into())
    }

    /// Convert to axum::ws::Message for transport.
    /// NOTE: axum::Message::Binary requires Vec<u8>, so Binary path copies.
    pub fn to_ws_message(&self) -> Message {
        match self {
            Payload::Json(v) => Message::Text(v.to_string()),
            Payload::Text(s) => Message::Text(s.to_string()),
            Payload::Binary(b) => Message::Binary(b.to_vec()),
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Json(v)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.into())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s.into())
    }
}
