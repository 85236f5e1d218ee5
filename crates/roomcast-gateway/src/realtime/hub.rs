//! Connection hub: registry + group membership + identity bindings.
//!
//! All three indices live behind one `RwLock`, so every mutating call
//! (add/close/join/leave/bind/unbind) is atomic with respect to every reader.
//! Cascades (closing a connection, aggregate joins by identity) run inside a
//! single write section.
//!
//! Fan-out lives in `router.rs`; it only takes the read lock long enough to
//! snapshot recipients.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use roomcast_core::{BindStatus, ConnectionId, JoinStatus, LeaveStatus, UnbindStatus};

use crate::obs::HubMetrics;
use crate::realtime::connection::ConnHandle;
use crate::realtime::core::{ConnectionRegistry, GroupIndex, IdentityBinder};
use crate::realtime::types::ConnData;

/// Split a comma-delimited group list; blanks are skipped.
pub fn split_groups(csv: &str) -> impl Iterator<Item = &str> {
    csv.split(',').map(str::trim).filter(|g| !g.is_empty())
}

#[derive(Default)]
pub(crate) struct HubState {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) groups: GroupIndex,
    pub(crate) identities: IdentityBinder,
}

impl HubState {
    /// Remove `id` from every index. Returns false if it was not registered.
    fn close(&mut self, id: &ConnectionId) -> bool {
        if self.registry.remove(id).is_none() {
            return false;
        }
        let groups = self.groups.leave_all(id);
        let identity = self.identities.unbind_connection(id);
        tracing::info!(
            conn = %id,
            groups = groups.len(),
            identity = identity.as_deref().unwrap_or(""),
            "connection closed"
        );
        true
    }
}

/// One hub per server, shared by reference (usually `Arc<Hub>`).
#[derive(Default)]
pub struct Hub {
    pub(crate) state: RwLock<HubState>,
    pub(crate) metrics: Arc<HubMetrics>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Arc<HubMetrics>) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }

    // --------------------
    // Connections
    // --------------------

    /// Register a connection. Re-registering a live handle returns its
    /// existing id and leaves its data untouched.
    pub fn add_connection(&self, handle: &ConnHandle, data: Option<ConnData>) -> ConnectionId {
        let (id, inserted) = self.state.write().registry.add(handle, data);
        if inserted {
            self.metrics.connections.inc(&[("event", "registered")]);
            tracing::info!(conn = %id, "connection registered");
        }
        id
    }

    /// Unregister a connection, leaving all its groups and dropping its
    /// identity binding. Returns false if the handle was not registered.
    pub fn close_connection(&self, handle: &ConnHandle) -> bool {
        let closed = {
            let mut st = self.state.write();
            match st.registry.id_of(handle) {
                Some(id) => st.close(&id),
                None => false,
            }
        };
        if closed {
            self.metrics.connections.inc(&[("event", "closed")]);
        }
        closed
    }

    pub fn close_connection_by_id(&self, id: &ConnectionId) -> bool {
        let closed = self.state.write().close(id);
        if closed {
            self.metrics.connections.inc(&[("event", "closed")]);
        }
        closed
    }

    pub fn connection_id_of(&self, handle: &ConnHandle) -> Option<ConnectionId> {
        self.state.read().registry.id_of(handle)
    }

    pub fn connection_data(&self, handle: &ConnHandle) -> Option<ConnData> {
        let st = self.state.read();
        let id = st.registry.id_of(handle)?;
        st.registry.data(&id).cloned()
    }

    pub fn connection_data_by_id(&self, id: &ConnectionId) -> Option<ConnData> {
        self.state.read().registry.data(id).cloned()
    }

    pub fn connection_by_id(&self, id: &ConnectionId) -> Option<ConnHandle> {
        self.state.read().registry.handle(id)
    }

    pub fn connection_count(&self) -> usize {
        self.state.read().registry.count()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.state.read().registry.ids().copied().collect()
    }

    pub fn is_connection_online(&self, id: &ConnectionId) -> bool {
        self.state.read().registry.contains(id)
    }

    /// Uniform pick among registered connections.
    pub fn random_connection(&self) -> Option<ConnHandle> {
        self.state
            .read()
            .registry
            .random(&mut rand::rng())
            .map(|(_, handle)| handle)
    }

    // --------------------
    // Groups
    // --------------------

    pub fn join_group(&self, group: &str, id: ConnectionId) -> JoinStatus {
        let status = {
            let mut guard = self.state.write();
            let st = &mut *guard;
            st.groups.join(&st.registry, group, id)
        };
        self.record_membership("join", status.as_str());
        tracing::debug!(conn = %id, group, status = status.as_str(), "join group");
        status
    }

    pub fn leave_group(&self, group: &str, id: ConnectionId) -> LeaveStatus {
        let status = {
            let mut guard = self.state.write();
            let st = &mut *guard;
            st.groups.leave(&st.registry, group, id)
        };
        self.record_membership("leave", status.as_str());
        tracing::debug!(conn = %id, group, status = status.as_str(), "leave group");
        status
    }

    /// Join every listed group with every connection bound to `identity`.
    ///
    /// Best-effort: reports the lowest status code seen across all
    /// (group, connection) pairs, so a single successful join yields `Ok`
    /// even if other pairs failed. `ConnectionNotFound` when the identity has
    /// no connections or the list is empty.
    pub fn join_by_identity(&self, groups_csv: &str, identity: &str) -> JoinStatus {
        let status = {
            let mut guard = self.state.write();
            let st = &mut *guard;
            let ids = st.identities.connections_of(identity);
            let mut statuses = Vec::new();
            for group in split_groups(groups_csv) {
                for id in &ids {
                    statuses.push(st.groups.join(&st.registry, group, *id));
                }
            }
            JoinStatus::min_of(statuses)
        };
        self.record_membership("join", status.as_str());
        tracing::debug!(identity, groups = groups_csv, status = status.as_str(), "join groups by identity");
        status
    }

    /// Leave counterpart of [`Hub::join_by_identity`], with the same
    /// lowest-code aggregation.
    pub fn leave_by_identity(&self, groups_csv: &str, identity: &str) -> LeaveStatus {
        let status = {
            let mut guard = self.state.write();
            let st = &mut *guard;
            let ids = st.identities.connections_of(identity);
            let mut statuses = Vec::new();
            for group in split_groups(groups_csv) {
                for id in &ids {
                    statuses.push(st.groups.leave(&st.registry, group, *id));
                }
            }
            LeaveStatus::min_of(statuses)
        };
        self.record_membership("leave", status.as_str());
        tracing::debug!(identity, groups = groups_csv, status = status.as_str(), "leave groups by identity");
        status
    }

    /// Leave every group; returns the groups left.
    pub fn leave_all_groups(&self, id: &ConnectionId) -> Vec<String> {
        let left = self.state.write().groups.leave_all(id);
        self.record_leave_all(left.len());
        tracing::debug!(conn = %id, groups = left.len(), "leave all groups");
        left
    }

    /// Leave every group with every connection bound to `identity`.
    /// Returns the number of memberships dropped.
    pub fn leave_all_groups_by_identity(&self, identity: &str) -> usize {
        let left = {
            let mut guard = self.state.write();
            let st = &mut *guard;
            st.identities
                .connections_of(identity)
                .iter()
                .map(|id| st.groups.leave_all(id).len())
                .sum::<usize>()
        };
        self.record_leave_all(left);
        tracing::debug!(identity, memberships = left, "leave all groups by identity");
        left
    }

    pub fn is_member(&self, group: &str, id: &ConnectionId) -> bool {
        self.state.read().groups.is_member(group, id)
    }

    /// True if any connection bound to `identity` is in `group`.
    pub fn is_member_by_identity(&self, group: &str, identity: &str) -> bool {
        let st = self.state.read();
        st.identities
            .connections_of(identity)
            .iter()
            .any(|id| st.groups.is_member(group, id))
    }

    pub fn groups_of(&self, id: &ConnectionId) -> Vec<String> {
        self.state.read().groups.groups_of(id)
    }

    /// Union of the groups of every connection bound to `identity`.
    pub fn groups_of_identity(&self, identity: &str) -> Vec<String> {
        let st = self.state.read();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in st.identities.connections_of(identity) {
            for group in st.groups.groups_of(&id) {
                if seen.insert(group.clone()) {
                    out.push(group);
                }
            }
        }
        out
    }

    pub fn group_count_of(&self, id: &ConnectionId) -> usize {
        self.state.read().groups.group_count_of(id)
    }

    pub fn group_count_of_identity(&self, identity: &str) -> usize {
        self.groups_of_identity(identity).len()
    }

    pub fn members_of(&self, group: &str) -> Vec<ConnectionId> {
        self.state.read().groups.members_of(group)
    }

    pub fn group_member_count(&self, group: &str) -> usize {
        self.state.read().groups.member_count(group)
    }

    /// Distinct identities bound to members of `group`.
    pub fn group_identity_count(&self, group: &str) -> usize {
        let st = self.state.read();
        st.groups
            .members_of(group)
            .iter()
            .filter_map(|id| st.identities.identity_of(id))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn group_ids(&self) -> Vec<String> {
        self.state.read().groups.group_ids()
    }

    pub fn group_count(&self) -> usize {
        self.state.read().groups.group_count()
    }

    // --------------------
    // Identities
    // --------------------

    /// Bind `id` to `identity`. Never overwrites an existing binding.
    pub fn bind_identity(&self, identity: &str, id: ConnectionId) -> BindStatus {
        let status = {
            let mut guard = self.state.write();
            let st = &mut *guard;
            st.identities.bind(&st.registry, identity, id)
        };
        self.metrics.bindings.inc(&[("op", "bind"), ("status", status.as_str())]);
        tracing::debug!(conn = %id, identity, status = status.as_str(), "bind identity");
        status
    }

    /// Drop every binding of `identity`.
    pub fn unbind_identity(&self, identity: &str) -> UnbindStatus {
        let (status, ids) = self.state.write().identities.unbind_identity(identity);
        self.metrics.bindings.inc(&[("op", "unbind"), ("status", status.as_str())]);
        tracing::debug!(identity, connections = ids.len(), status = status.as_str(), "unbind identity");
        status
    }

    /// Drop the binding of a single connection.
    pub fn unbind_connection(&self, id: &ConnectionId) -> UnbindStatus {
        let status = match self.state.write().identities.unbind_connection(id) {
            Some(_) => UnbindStatus::Ok,
            None => UnbindStatus::NotFound,
        };
        self.metrics.bindings.inc(&[("op", "unbind"), ("status", status.as_str())]);
        tracing::debug!(conn = %id, status = status.as_str(), "unbind connection");
        status
    }

    pub fn identity_of(&self, id: &ConnectionId) -> Option<String> {
        self.state.read().identities.identity_of(id).map(str::to_owned)
    }

    pub fn connections_of(&self, identity: &str) -> Vec<ConnectionId> {
        self.state.read().identities.connections_of(identity)
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.state.read().identities.is_online(identity)
    }

    /// Identities with at least one bound connection.
    pub fn identities(&self) -> Vec<String> {
        self.state.read().identities.identities()
    }

    pub fn identity_count(&self) -> usize {
        self.state.read().identities.identity_count()
    }

    pub fn bound_connection_ids(&self) -> Vec<ConnectionId> {
        self.state.read().identities.bound_connection_ids()
    }

    pub fn bound_connection_count(&self) -> usize {
        self.state.read().identities.bound_connection_count()
    }

    /// Gauge lines for `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let st = self.state.read();
        vec![
            ("roomcast_connections", st.registry.count() as u64),
            ("roomcast_groups", st.groups.group_count() as u64),
            ("roomcast_identities", st.identities.identity_count() as u64),
        ]
    }

    fn record_membership(&self, op: &str, status: &str) {
        self.metrics.memberships.inc(&[("op", op), ("status", status)]);
    }

    fn record_leave_all(&self, memberships: usize) {
        self.metrics.memberships.add(
            &[("op", "leave"), ("status", LeaveStatus::Ok.as_str())],
            memberships as u64,
        );
    }
}
