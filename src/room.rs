use std::collections::HashSet;

use crate::participant::ConnectionId;

/// A named group of connections that receive the same broadcasts.
#[derive(Debug, Default)]
pub struct Room {
    members: HashSet<ConnectionId>,
}

impl Room {
    /// Returns false when the connection was already a member.
    pub fn add_member(&mut self, connection_id: &str) -> bool {
        self.members.insert(connection_id.to_string())
    }

    pub fn remove_member(&mut self, connection_id: &str) -> bool {
        self.members.remove(connection_id)
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.members.contains(connection_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
