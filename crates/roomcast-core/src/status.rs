//! Soft-miss status codes for membership and binding operations.
//!
//! Every code carries a small numeric value. Lower is better: `0` is success.
//! Aggregate operations that touch many (group, connection) pairs report the
//! numeric minimum across all pairs, so one successful pair makes the whole
//! call report success.

/// Result of joining a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinStatus {
    Ok,
    AlreadyMember,
    ConnectionNotFound,
}

impl JoinStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinStatus::Ok => "OK",
            JoinStatus::AlreadyMember => "ALREADY_MEMBER",
            JoinStatus::ConnectionNotFound => "CONNECTION_NOT_FOUND",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            JoinStatus::Ok => 0,
            JoinStatus::AlreadyMember => 1,
            JoinStatus::ConnectionNotFound => 2,
        }
    }

    pub fn is_ok(self) -> bool {
        self == JoinStatus::Ok
    }

    /// Lowest code among `statuses`; `ConnectionNotFound` when empty.
    pub fn min_of(statuses: impl IntoIterator<Item = JoinStatus>) -> JoinStatus {
        statuses
            .into_iter()
            .fold(JoinStatus::ConnectionNotFound, |acc, s| {
                if s.code() < acc.code() { s } else { acc }
            })
    }
}

/// Result of leaving a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveStatus {
    Ok,
    GroupNotFound,
    /// Group exists and connection is registered, but it is not a member.
    NotMember,
    ConnectionMissing,
}

impl LeaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveStatus::Ok => "OK",
            LeaveStatus::GroupNotFound => "GROUP_NOT_FOUND",
            LeaveStatus::NotMember => "NOT_MEMBER",
            LeaveStatus::ConnectionMissing => "CONNECTION_MISSING",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            LeaveStatus::Ok => 0,
            LeaveStatus::GroupNotFound | LeaveStatus::NotMember => 1,
            LeaveStatus::ConnectionMissing => 2,
        }
    }

    pub fn is_ok(self) -> bool {
        self == LeaveStatus::Ok
    }

    /// Lowest code among `statuses`; `ConnectionMissing` when empty.
    pub fn min_of(statuses: impl IntoIterator<Item = LeaveStatus>) -> LeaveStatus {
        statuses
            .into_iter()
            .fold(LeaveStatus::ConnectionMissing, |acc, s| {
                if s.code() < acc.code() { s } else { acc }
            })
    }
}

/// Result of binding a connection to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindStatus {
    Bound,
    /// Connection already carries a binding (to this or another identity).
    AlreadyBoundElsewhere,
    ConnectionNotFound,
}

impl BindStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BindStatus::Bound => "BOUND",
            BindStatus::AlreadyBoundElsewhere => "ALREADY_BOUND_ELSEWHERE",
            BindStatus::ConnectionNotFound => "CONNECTION_NOT_FOUND",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BindStatus::Bound => 0,
            BindStatus::AlreadyBoundElsewhere => 1,
            BindStatus::ConnectionNotFound => 2,
        }
    }

    pub fn is_bound(self) -> bool {
        self == BindStatus::Bound
    }
}

/// Result of removing a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnbindStatus {
    Ok,
    NotFound,
}

impl UnbindStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UnbindStatus::Ok => "OK",
            UnbindStatus::NotFound => "NOT_FOUND",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            UnbindStatus::Ok => 0,
            UnbindStatus::NotFound => 1,
        }
    }

    pub fn is_ok(self) -> bool {
        self == UnbindStatus::Ok
    }
}
