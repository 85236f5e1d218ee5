//! Realtime hub: connection registry, groups, identity bindings, and the
//! routing operations that fan messages out over them.

pub mod connection;
pub mod core;
pub mod hub;
pub mod router;
pub mod types;

pub use connection::{ChannelConnection, ConnHandle, Connection, Deliverable, DeliveryError, IdSlot};
pub use hub::{split_groups, Hub};
pub use router::{deliver, FanoutReport};
pub use types::{ConnData, Payload};
