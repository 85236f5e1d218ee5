//! roomcast gateway library entry.
//!
//! The hub (`realtime`) tracks live connections, groups and identity bindings
//! and routes messages over them. The remaining modules wire it into a
//! WebSocket server: config, metrics, ops endpoints and the transport adapter.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod realtime;
pub mod router;
pub mod transport;

pub use realtime::{FanoutReport, Hub, Payload};
