use roomcast_core::{BiMultiMap, BindStatus, ConnectionId, UnbindStatus};

use super::registry::ConnectionRegistry;

/// Identity bindings:
/// - `identity -> {connection_id...}` (multi-device)
/// - `connection_id -> identity` (at most one)
#[derive(Default)]
pub struct IdentityBinder {
    links: BiMultiMap<String, ConnectionId>,
}

impl IdentityBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `identity`. An existing binding is never overwritten.
    pub fn bind(&mut self, registry: &ConnectionRegistry, identity: &str, id: ConnectionId) -> BindStatus {
        if !registry.contains(&id) {
            return BindStatus::ConnectionNotFound;
        }
        if self.links.contains_right(&id) {
            return BindStatus::AlreadyBoundElsewhere;
        }
        self.links.insert(identity.to_string(), id);
        BindStatus::Bound
    }

    /// Remove every connection bound to `identity`.
    pub fn unbind_identity(&mut self, identity: &str) -> (UnbindStatus, Vec<ConnectionId>) {
        let ids = self.links.remove_left(identity);
        if ids.is_empty() {
            (UnbindStatus::NotFound, ids)
        } else {
            (UnbindStatus::Ok, ids)
        }
    }

    /// Remove the binding of `id`, returning the identity it was bound to.
    pub fn unbind_connection(&mut self, id: &ConnectionId) -> Option<String> {
        self.links.remove_right(id).into_iter().next()
    }

    pub fn identity_of(&self, id: &ConnectionId) -> Option<&str> {
        self.links.lefts_of(id).next().map(String::as_str)
    }

    pub fn connections_of(&self, identity: &str) -> Vec<ConnectionId> {
        self.links.rights_of(identity).copied().collect()
    }

    pub fn connection_count_of(&self, identity: &str) -> usize {
        self.links.right_count(identity)
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.links.contains_left(identity)
    }

    pub fn identities(&self) -> Vec<String> {
        self.links.lefts().cloned().collect()
    }

    pub fn identity_count(&self) -> usize {
        self.links.left_len()
    }

    pub fn bound_connection_ids(&self) -> Vec<ConnectionId> {
        self.links.rights().copied().collect()
    }

    pub fn bound_connection_count(&self) -> usize {
        self.links.right_len()
    }
}
