//! Group struct definition
//!
//! A named broadcast group. Membership is a set of session ids; the group
//! outlives its members and is never deleted implicitly.

use std::collections::HashSet;

use crate::types::SessionId;

/// Named chat group
#[derive(Debug)]
pub struct Group {
    /// Group name
    pub name: String,
    /// Member sessions
    members: HashSet<SessionId>,
}

impl Group {
    /// Create a new group with its founder as the first member
    pub fn new(name: String, founder: SessionId) -> Self {
        let mut members = HashSet::new();
        members.insert(founder);
        Self { name, members }
    }

    /// Check if a session is a member
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.members.contains(&session_id)
    }

    /// Add a member
    ///
    /// Returns false if the session was already a member.
    pub fn add_member(&mut self, session_id: SessionId) -> bool {
        self.members.insert(session_id)
    }

    /// Remove a member
    ///
    /// Returns true if the session was a member.
    pub fn remove_member(&mut self, session_id: SessionId) -> bool {
        self.members.remove(&session_id)
    }

    /// Point-in-time copy of the member set
    pub fn snapshot(&self) -> Vec<SessionId> {
        self.members.iter().copied().collect()
    }

    /// Number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
