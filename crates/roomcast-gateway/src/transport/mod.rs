//! Transport layer (WebSocket).
//!
//! Adapts accepted sockets to hub connections; the hub itself never touches
//! the socket.

pub mod ws;
