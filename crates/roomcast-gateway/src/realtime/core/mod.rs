//! Hub indices.
//!
//! Plain single-owner structures: the connection registry, group membership,
//! and identity bindings. They do no locking of their own; `Hub` keeps all
//! three behind one lock so every mutation is atomic across them.

mod groups;
mod identity;
mod registry;

pub use groups::GroupIndex;
pub use identity::IdentityBinder;
pub use registry::{ConnectionRegistry, Entry};
