//! roomcast core: transport-agnostic primitives shared by the hub and any
//! integration code.
//!
//! This crate defines connection identifiers, the soft-miss status codes
//! returned by membership/binding operations, the shared error surface, and the
//! bidirectional index the hub is built on. It carries no runtime or transport
//! dependencies.
//!
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `RoomcastError`/`Result` or as a status code.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod id;
pub mod index;
pub mod status;

pub use error::{ErrorCode, Result, RoomcastError};
pub use id::ConnectionId;
pub use index::BiMultiMap;
pub use status::{BindStatus, JoinStatus, LeaveStatus, UnbindStatus};
