use std::sync::Arc;

use indexmap::IndexMap;
use rand::Rng;

use roomcast_core::ConnectionId;

use crate::realtime::connection::ConnHandle;
use crate::realtime::types::ConnData;

/// One registered connection.
#[derive(Clone)]
pub struct Entry {
    pub handle: ConnHandle,
    pub data: Option<ConnData>,
}

/// Connection registry: `connection_id -> (handle, opaque data)`.
///
/// Backed by an `IndexMap` so a uniform random pick is a single `get_index`.
#[derive(Default)]
pub struct ConnectionRegistry {
    conns: IndexMap<ConnectionId, Entry>,
}

/// Same underlying connection object (vtables are ignored).
fn same_handle(a: &ConnHandle, b: &ConnHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle`. Returns `(id, inserted)`.
    ///
    /// A handle that is already live keeps its id and its data. Anything else,
    /// including a handle whose slot still holds an id from an earlier
    /// registration, gets a fresh id.
    pub fn add(&mut self, handle: &ConnHandle, data: Option<ConnData>) -> (ConnectionId, bool) {
        if let Some(id) = self.id_of(handle) {
            return (id, false);
        }

        let mut id = ConnectionId::random();
        while id == ConnectionId::NIL || self.conns.contains_key(&id) {
            id = ConnectionId::random();
        }
        handle.id_slot().assign(id);
        self.conns.insert(
            id,
            Entry {
                handle: Arc::clone(handle),
                data,
            },
        );
        (id, true)
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Entry> {
        self.conns.swap_remove(id)
    }

    /// Live id of `handle`, if it is registered.
    pub fn id_of(&self, handle: &ConnHandle) -> Option<ConnectionId> {
        let id = handle.id_slot().get()?;
        let entry = self.conns.get(&id)?;
        same_handle(&entry.handle, handle).then_some(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.conns.contains_key(id)
    }

    pub fn handle(&self, id: &ConnectionId) -> Option<ConnHandle> {
        self.conns.get(id).map(|e| Arc::clone(&e.handle))
    }

    pub fn data(&self, id: &ConnectionId) -> Option<&ConnData> {
        self.conns.get(id).and_then(|e| e.data.as_ref())
    }

    pub fn count(&self) -> usize {
        self.conns.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.conns.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &Entry)> {
        self.conns.iter()
    }

    /// Uniform pick among live connections.
    pub fn random<G: Rng + ?Sized>(&self, rng: &mut G) -> Option<(ConnectionId, ConnHandle)> {
        if self.conns.is_empty() {
            return None;
        }
        let (id, entry) = self.conns.get_index(rng.random_range(0..self.conns.len()))?;
        Some((*id, Arc::clone(&entry.handle)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::realtime::connection::ChannelConnection;
    use serde_json::json;

    fn handle() -> ConnHandle {
        let (conn, _rx) = ChannelConnection::channel(8);
        conn
    }

    #[test]
    fn add_is_idempotent_per_handle() {
        let mut reg = ConnectionRegistry::new();
        let h = handle();
        let (a, inserted) = reg.add(&h, Some(json!({"n": 1})));
        assert!(inserted);
        let (b, inserted) = reg.add(&h, Some(json!({"n": 2})));
        assert!(!inserted);
        assert_eq!(a, b);
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.data(&a), Some(&json!({"n": 1})));
    }

    #[test]
    fn re_adding_a_removed_handle_gets_a_fresh_id() {
        let mut reg = ConnectionRegistry::new();
        let h = handle();
        let (old, _) = reg.add(&h, None);
        assert!(reg.remove(&old).is_some());
        let (new, inserted) = reg.add(&h, None);
        assert!(inserted);
        assert_ne!(old, new);
        assert_eq!(h.id_slot().get(), Some(new));
    }

    #[test]
    fn random_pick_on_empty_registry_is_none() {
        let reg = ConnectionRegistry::new();
        assert!(reg.random(&mut rand::rng()).is_none());
    }

    #[test]
    fn random_pick_returns_a_live_connection() {
        let mut reg = ConnectionRegistry::new();
        let (a, _) = reg.add(&handle(), None);
        let (b, _) = reg.add(&handle(), None);
        let (id, _) = reg.random(&mut rand::rng()).unwrap();
        assert!(id == a || id == b);
    }
}
