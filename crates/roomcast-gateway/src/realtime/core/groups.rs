use rand::Rng;

use roomcast_core::{BiMultiMap, ConnectionId, JoinStatus, LeaveStatus};

use super::registry::ConnectionRegistry;

/// Group membership: group_id -> connections, connection -> group_ids.
///
/// A group exists only while it has members.
#[derive(Default)]
pub struct GroupIndex {
    links: BiMultiMap<String, ConnectionId>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, registry: &ConnectionRegistry, group: &str, id: ConnectionId) -> JoinStatus {
        if !registry.contains(&id) {
            return JoinStatus::ConnectionNotFound;
        }
        if self.links.insert(group.to_string(), id) {
            JoinStatus::Ok
        } else {
            JoinStatus::AlreadyMember
        }
    }

    pub fn leave(&mut self, registry: &ConnectionRegistry, group: &str, id: ConnectionId) -> LeaveStatus {
        if !registry.contains(&id) {
            return LeaveStatus::ConnectionMissing;
        }
        if !self.links.contains_left(group) {
            return LeaveStatus::GroupNotFound;
        }
        if self.links.remove(group, &id) {
            LeaveStatus::Ok
        } else {
            LeaveStatus::NotMember
        }
    }

    /// Leave every group of `id`; returns the groups it was in.
    pub fn leave_all(&mut self, id: &ConnectionId) -> Vec<String> {
        self.links.remove_right(id)
    }

    pub fn is_member(&self, group: &str, id: &ConnectionId) -> bool {
        self.links.contains(group, id)
    }

    pub fn groups_of(&self, id: &ConnectionId) -> Vec<String> {
        self.links.lefts_of(id).cloned().collect()
    }

    pub fn group_count_of(&self, id: &ConnectionId) -> usize {
        self.links.left_count(id)
    }

    pub fn members_of(&self, group: &str) -> Vec<ConnectionId> {
        self.links.rights_of(group).copied().collect()
    }

    pub fn member_count(&self, group: &str) -> usize {
        self.links.right_count(group)
    }

    pub fn group_ids(&self) -> Vec<String> {
        self.links.lefts().cloned().collect()
    }

    pub fn group_count(&self) -> usize {
        self.links.left_len()
    }

    pub fn random_member<G: Rng + ?Sized>(&self, group: &str, rng: &mut G) -> Option<ConnectionId> {
        self.links.sample_right(group, rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::connection::{ChannelConnection, ConnHandle};

    fn registry_with(n: usize) -> (ConnectionRegistry, Vec<ConnectionId>) {
        let mut reg = ConnectionRegistry::new();
        let ids = (0..n)
            .map(|_| {
                let (conn, _rx) = ChannelConnection::channel(4);
                let h: ConnHandle = conn;
                reg.add(&h, None).0
            })
            .collect();
        (reg, ids)
    }

    #[test]
    fn join_requires_registered_connection() {
        let (reg, _) = registry_with(0);
        let mut groups = GroupIndex::new();
        let status = groups.join(&reg, "room", ConnectionId::random());
        assert_eq!(status, JoinStatus::ConnectionNotFound);
        assert_eq!(groups.group_count(), 0);
    }

    #[test]
    fn join_twice_reports_already_member() {
        let (reg, ids) = registry_with(1);
        let mut groups = GroupIndex::new();
        assert_eq!(groups.join(&reg, "room", ids[0]), JoinStatus::Ok);
        assert_eq!(groups.join(&reg, "room", ids[0]), JoinStatus::AlreadyMember);
        assert_eq!(groups.member_count("room"), 1);
    }

    #[test]
    fn leave_statuses() {
        let (reg, ids) = registry_with(2);
        let mut groups = GroupIndex::new();
        groups.join(&reg, "room", ids[0]);

        assert_eq!(groups.leave(&reg, "nope", ids[0]), LeaveStatus::GroupNotFound);
        assert_eq!(groups.leave(&reg, "room", ids[1]), LeaveStatus::NotMember);
        assert_eq!(
            groups.leave(&reg, "room", ConnectionId::random()),
            LeaveStatus::ConnectionMissing
        );
        assert_eq!(groups.leave(&reg, "room", ids[0]), LeaveStatus::Ok);
    }

    #[test]
    fn last_leave_prunes_group() {
        let (reg, ids) = registry_with(2);
        let mut groups = GroupIndex::new();
        groups.join(&reg, "room", ids[0]);
        groups.join(&reg, "room", ids[1]);
        groups.leave(&reg, "room", ids[0]);
        assert_eq!(groups.group_ids(), vec!["room".to_string()]);
        groups.leave(&reg, "room", ids[1]);
        assert!(groups.group_ids().is_empty());
        assert!(groups.groups_of(&ids[1]).is_empty());
    }

    #[test]
    fn leave_all_cascades_to_every_group() {
        let (reg, ids) = registry_with(2);
        let mut groups = GroupIndex::new();
        groups.join(&reg, "a", ids[0]);
        groups.join(&reg, "b", ids[0]);
        groups.join(&reg, "b", ids[1]);

        let mut left = groups.leave_all(&ids[0]);
        left.sort();
        assert_eq!(left, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(groups.group_ids(), vec!["b".to_string()]);
        assert_eq!(groups.members_of("b"), vec![ids[1]]);
    }

    #[test]
    fn random_member_only_from_that_group() {
        let (reg, ids) = registry_with(3);
        let mut groups = GroupIndex::new();
        groups.join(&reg, "a", ids[0]);
        groups.join(&reg, "a", ids[1]);
        groups.join(&reg, "b", ids[2]);
        let mut rng = rand::rng();
        for _ in 0..16 {
            let m = groups.random_member("a", &mut rng);
            assert!(m == Some(ids[0]) || m == Some(ids[1]));
        }
        assert_eq!(groups.random_member("missing", &mut rng), None);
    }
}
