//! Session Registry
//!
//! Maps user identities to their live connections and rooms to the
//! connections subscribed to them. Process-local state only: entries exist
//! exactly as long as connections do, independent of persisted memberships.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::application::dto::ServerEvent;

/// One live connection: owning identity, outbox and the set of room
/// subscriptions it currently holds.
pub struct Connection {
    pub session_id: String,
    pub user_id: i64,
    sender: mpsc::UnboundedSender<ServerEvent>,
    rooms: RwLock<HashSet<i64>>,
}

impl Connection {
    pub fn new(session_id: String, user_id: i64, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id,
            user_id,
            sender,
            rooms: RwLock::new(HashSet::new()),
        }
    }

    /// Queue an event on this connection. A send to a connection that died
    /// mid-flight is simply skipped, not retried.
    pub fn send(&self, event: ServerEvent) -> bool {
        let ok = self.sender.send(event).is_ok();
        if !ok {
            tracing::debug!(session_id = %self.session_id, "Dropped event for dead connection");
        }
        ok
    }

    pub fn is_in_room(&self, room_id: i64) -> bool {
        self.rooms.read().contains(&room_id)
    }

    pub fn room_ids(&self) -> Vec<i64> {
        self.rooms.read().iter().copied().collect()
    }
}

/// Registry of live connections.
///
/// A connection appears under exactly one identity; an identity with zero
/// connections is absent from the map (no empty-set entries persist).
pub struct SessionRegistry {
    /// Active connections by session_id
    sessions: DashMap<String, Arc<Connection>>,
    /// User ID to session IDs (one user can hold multiple connections)
    user_sessions: DashMap<i64, Vec<String>>,
    /// Room ID to session IDs (for room fan-out)
    room_sessions: DashMap<i64, Vec<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            user_sessions: DashMap::new(),
            room_sessions: DashMap::new(),
        }
    }

    /// Register a connection under its identity.
    ///
    /// Returns `true` when this is the identity's first live connection
    /// (the presence tracker turns that into an Online transition).
    pub fn register(&self, connection: Arc<Connection>) -> bool {
        let session_id = connection.session_id.clone();
        let user_id = connection.user_id;

        // Idempotent: re-registering the same session is a no-op.
        if self.sessions.contains_key(&session_id) {
            return false;
        }
        self.sessions.insert(session_id.clone(), connection);

        let mut entry = self.user_sessions.entry(user_id).or_default();
        let first = entry.is_empty();
        entry.push(session_id.clone());
        drop(entry);

        tracing::info!(user_id, session_id = %session_id, "Session registered");
        first
    }

    /// Unregister a connection.
    ///
    /// Returns the owning identity and whether this was its last live
    /// connection. The identity's entry is dropped when its set empties.
    pub fn unregister(&self, session_id: &str) -> Option<(i64, bool)> {
        let (_, connection) = self.sessions.remove(session_id)?;

        for room_id in connection.room_ids() {
            if let Some(mut sessions) = self.room_sessions.get_mut(&room_id) {
                sessions.retain(|s| s != session_id);
            }
        }

        let user_id = connection.user_id;
        let mut last = false;
        if let Some(mut sessions) = self.user_sessions.get_mut(&user_id) {
            sessions.retain(|s| s != session_id);
            last = sessions.is_empty();
        }
        if last {
            self.user_sessions.remove_if(&user_id, |_, v| v.is_empty());
        }

        tracing::info!(user_id, session_id = %session_id, "Session unregistered");
        Some((user_id, last))
    }

    /// Every live connection of an identity.
    pub fn connections_of(&self, user_id: i64) -> Vec<Arc<Connection>> {
        self.user_sessions
            .get(&user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id).map(|c| Arc::clone(&c)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every connection subscribed to a room.
    pub fn connections_in_room(&self, room_id: i64) -> Vec<Arc<Connection>> {
        self.room_sessions
            .get(&room_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id).map(|c| Arc::clone(&c)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every live connection (global fan-out).
    pub fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.sessions.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Subscribe a connection to a room's broadcast group. Idempotent.
    pub fn subscribe(&self, session_id: &str, room_id: i64) -> bool {
        let Some(connection) = self.sessions.get(session_id) else {
            return false;
        };
        if !connection.rooms.write().insert(room_id) {
            return false;
        }
        self.room_sessions
            .entry(room_id)
            .or_default()
            .push(session_id.to_string());
        true
    }

    /// Unsubscribe a connection from a room. Idempotent.
    pub fn unsubscribe(&self, session_id: &str, room_id: i64) {
        if let Some(connection) = self.sessions.get(session_id) {
            connection.rooms.write().remove(&room_id);
        }
        if let Some(mut sessions) = self.room_sessions.get_mut(&room_id) {
            sessions.retain(|s| s != session_id);
        }
    }

    /// Unsubscribe every connection of an identity from a room.
    pub fn unsubscribe_user(&self, user_id: i64, room_id: i64) {
        for connection in self.connections_of(user_id) {
            self.unsubscribe(&connection.session_id, room_id);
        }
    }

    /// Drop a room's broadcast group entirely (room destruction).
    pub fn drop_room(&self, room_id: i64) {
        if let Some((_, session_ids)) = self.room_sessions.remove(&room_id) {
            for session_id in session_ids {
                if let Some(connection) = self.sessions.get(&session_id) {
                    connection.rooms.write().remove(&room_id);
                }
            }
        }
    }

    /// Whether the identity holds at least one live connection.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.user_sessions
            .get(&user_id)
            .map(|sessions| !sessions.is_empty())
            .unwrap_or(false)
    }

    /// Whether any of the identity's connections is subscribed to the room.
    pub fn is_user_in_room(&self, user_id: i64, room_id: i64) -> bool {
        self.connections_of(user_id)
            .iter()
            .any(|c| c.is_in_room(room_id))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(registry: &SessionRegistry, user_id: i64, session_id: &str) -> Arc<Connection> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Connection::new(session_id.to_string(), user_id, tx));
        registry.register(Arc::clone(&connection));
        connection
    }

    #[test]
    fn first_and_last_connection_are_reported() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = Arc::new(Connection::new("a".into(), 1, tx));
        assert!(registry.register(Arc::clone(&first)));

        let (tx, _rx) = mpsc::unbounded_channel();
        let second = Arc::new(Connection::new("b".into(), 1, tx));
        assert!(!registry.register(second));

        assert_eq!(registry.unregister("a"), Some((1, false)));
        assert_eq!(registry.unregister("b"), Some((1, true)));
        assert!(!registry.is_online(1));
        // No empty-set entry remains.
        assert!(registry.user_sessions.get(&1).is_none());
    }

    #[test]
    fn register_is_idempotent_per_session() {
        let registry = SessionRegistry::new();
        let connection = connect(&registry, 1, "a");
        assert!(!registry.register(connection));
        assert_eq!(registry.connections_of(1).len(), 1);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let registry = SessionRegistry::new();
        connect(&registry, 1, "a");

        assert!(registry.subscribe("a", 10));
        assert!(!registry.subscribe("a", 10));
        assert_eq!(registry.connections_in_room(10).len(), 1);
    }

    #[test]
    fn unregister_clears_room_groups() {
        let registry = SessionRegistry::new();
        connect(&registry, 1, "a");
        registry.subscribe("a", 10);

        registry.unregister("a");
        assert!(registry.connections_in_room(10).is_empty());
    }

    #[test]
    fn drop_room_clears_every_subscriber() {
        let registry = SessionRegistry::new();
        connect(&registry, 1, "a");
        connect(&registry, 2, "b");
        registry.subscribe("a", 10);
        registry.subscribe("b", 10);

        registry.drop_room(10);
        assert!(registry.connections_in_room(10).is_empty());
        assert!(!registry.is_user_in_room(1, 10));
        assert!(!registry.is_user_in_room(2, 10));
    }
}
