//! In-memory room membership for live gateway connections.
//!
//! Presence is per-**connection**: each connection carries the set of rooms it
//! has joined. A user counts as present in a room when any one of their open
//! connections has that room joined. Every connection is enrolled in its
//! user's personal room (room id == user id) and in the public room.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::models::conversation::PUBLIC_ROOM;

/// Rooms joined by a single connection.
struct ConnectionEntry {
    user_id: String,
    rooms: HashSet<String>,
}

/// A connection removed from the registry on disconnect.
pub struct DepartedConnection {
    pub user_id: String,
    pub rooms: HashSet<String>,
}

/// Thread-safe, DashMap-backed presence registry.
///
/// Never hold an entry from one map while writing the other: reads take
/// `users` then `connections`; writers touch one map at a time.
pub struct PresenceRegistry {
    connections: DashMap<String, ConnectionEntry>,
    /// user id → ids of that user's open connections.
    users: DashMap<String, HashSet<String>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Register a freshly authenticated connection and join it to the user's
    /// personal room and the public room.
    pub fn enroll(&self, connection_id: &str, user_id: &str) {
        let rooms: HashSet<String> = [user_id.to_string(), PUBLIC_ROOM.to_string()]
            .into_iter()
            .collect();
        self.connections.insert(
            connection_id.to_string(),
            ConnectionEntry {
                user_id: user_id.to_string(),
                rooms,
            },
        );
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Join a connection to `room_id`. Returns `true` if it was not already
    /// a member; joining twice has no further effect.
    pub fn join_room(&self, connection_id: &str, room_id: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut entry) => entry.rooms.insert(room_id.to_string()),
            None => false,
        }
    }

    /// Whether this specific connection has joined `room_id`.
    pub fn is_in_room(&self, connection_id: &str, room_id: &str) -> bool {
        self.connections
            .get(connection_id)
            .map(|entry| entry.rooms.contains(room_id))
            .unwrap_or(false)
    }

    /// True iff at least one of the user's open connections has joined `room_id`.
    pub fn is_user_present_in_room(&self, user_id: &str, room_id: &str) -> bool {
        let Some(connection_ids) = self.users.get(user_id) else {
            return false;
        };
        connection_ids
            .iter()
            .any(|connection_id| self.is_in_room(connection_id, room_id))
    }

    /// Number of open connections for a user.
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.users.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    /// Drop a connection from every room it joined.
    pub fn remove_connection(&self, connection_id: &str) -> Option<DepartedConnection> {
        let (_, entry) = self.connections.remove(connection_id)?;

        let now_empty = match self.users.get_mut(&entry.user_id) {
            Some(mut ids) => {
                ids.remove(connection_id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.users
                .remove_if(&entry.user_id, |_, ids| ids.is_empty());
        }

        Some(DepartedConnection {
            user_id: entry.user_id,
            rooms: entry.rooms,
        })
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enroll_joins_personal_and_public_rooms() {
        let reg = PresenceRegistry::new();
        reg.enroll("conn_1", "usr_a");

        assert!(reg.is_in_room("conn_1", "usr_a"));
        assert!(reg.is_in_room("conn_1", PUBLIC_ROOM));
        assert!(!reg.is_in_room("conn_1", "conv_x"));
        assert_eq!(reg.connection_count("usr_a"), 1);
    }

    #[test]
    fn join_room_is_idempotent() {
        let reg = PresenceRegistry::new();
        reg.enroll("conn_1", "usr_a");

        assert!(reg.join_room("conn_1", "conv_x"));
        assert!(!reg.join_room("conn_1", "conv_x"));
        assert!(reg.is_in_room("conn_1", "conv_x"));
    }

    #[test]
    fn join_room_for_unknown_connection_is_ignored() {
        let reg = PresenceRegistry::new();
        assert!(!reg.join_room("conn_ghost", "conv_x"));
        assert!(!reg.is_in_room("conn_ghost", "conv_x"));
    }

    #[test]
    fn user_is_present_when_any_device_has_room_open() {
        let reg = PresenceRegistry::new();
        reg.enroll("conn_phone", "usr_b");
        reg.enroll("conn_laptop", "usr_b");

        assert!(!reg.is_user_present_in_room("usr_b", "conv_x"));

        reg.join_room("conn_laptop", "conv_x");
        assert!(reg.is_user_present_in_room("usr_b", "conv_x"));
        assert!(!reg.is_user_present_in_room("usr_a", "conv_x"));
    }

    #[test]
    fn disconnect_removes_membership_for_that_device_only() {
        let reg = PresenceRegistry::new();
        reg.enroll("conn_phone", "usr_b");
        reg.enroll("conn_laptop", "usr_b");
        reg.join_room("conn_phone", "conv_x");
        reg.join_room("conn_laptop", "conv_x");

        let departed = reg.remove_connection("conn_phone").unwrap();
        assert_eq!(departed.user_id, "usr_b");
        assert!(departed.rooms.contains("conv_x"));
        assert!(reg.is_user_present_in_room("usr_b", "conv_x"));
        assert_eq!(reg.connection_count("usr_b"), 1);

        reg.remove_connection("conn_laptop");
        assert!(!reg.is_user_present_in_room("usr_b", "conv_x"));
        assert!(!reg.is_user_present_in_room("usr_b", "usr_b"));
        assert_eq!(reg.connection_count("usr_b"), 0);
    }

    #[test]
    fn removing_twice_is_harmless() {
        let reg = PresenceRegistry::new();
        reg.enroll("conn_1", "usr_a");
        assert!(reg.remove_connection("conn_1").is_some());
        assert!(reg.remove_connection("conn_1").is_none());
    }
}
