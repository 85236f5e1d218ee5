//! Connection capability contract.
//!
//! The hub stores connections as `Arc<dyn Connection>`. A connection carries an
//! id slot, written by the registry on first registration and read afterwards,
//! and optionally exposes a [`Deliverable`] sink. Transport adapters implement
//! both; [`ChannelConnection`] is the tokio mpsc adapter used by the WebSocket
//! transport.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use roomcast_core::ConnectionId;

use crate::realtime::types::Payload;

/// Transport-level reason a single delivery did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,
    #[error("outbound channel closed")]
    Closed,
}

/// Single-argument send capability.
pub trait Deliverable: Send + Sync {
    fn deliver(&self, payload: Payload) -> Result<(), DeliveryError>;
}

/// A transport connection as seen by the hub.
pub trait Connection: Send + Sync {
    /// Slot holding the id assigned by the registry.
    fn id_slot(&self) -> &IdSlot;

    /// Delivery capability, if this connection can receive messages.
    fn deliverable(&self) -> Option<&dyn Deliverable>;
}

/// Shared connection handle.
pub type ConnHandle = Arc<dyn Connection>;

/// Id slot owned by a connection and written by the registry.
#[derive(Debug, Default)]
pub struct IdSlot(Mutex<Option<ConnectionId>>);

impl IdSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<ConnectionId> {
        *self.0.lock()
    }

    pub(crate) fn assign(&self, id: ConnectionId) {
        *self.0.lock() = Some(id);
    }
}

/// Connection backed by a bounded tokio mpsc queue.
///
/// Delivery never blocks: a full queue reports `QueueFull` and the payload is
/// dropped.
#[derive(Debug)]
pub struct ChannelConnection {
    slot: IdSlot,
    tx: mpsc::Sender<Payload>,
}

impl ChannelConnection {
    pub fn new(tx: mpsc::Sender<Payload>) -> Self {
        Self {
            slot: IdSlot::new(),
            tx,
        }
    }

    /// Build a connection plus the receiving half of its queue.
    pub fn channel(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(tx)), rx)
    }

    pub fn id(&self) -> Option<ConnectionId> {
        self.slot.get()
    }
}

impl Deliverable for ChannelConnection {
    fn deliver(&self, payload: Payload) -> Result<(), DeliveryError> {
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl Connection for ChannelConnection {
    fn id_slot(&self) -> &IdSlot {
        &self.slot
    }

    fn deliverable(&self) -> Option<&dyn Deliverable> {
        Some(self)
    }
}
