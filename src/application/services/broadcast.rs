//! Broadcast Router
//!
//! The single point that fans events out to connections: unfiltered room
//! notices, block/mute-filtered message delivery and global status
//! broadcasts. The router only reads shared state; it never mutates
//! role/ban/mute rows.

use std::sync::Arc;

use chrono::Utc;

use crate::application::dto::{ChatMessage, ServerEvent, UserStatus};
use crate::application::services::session_registry::SessionRegistry;
use crate::domain::{MembershipRepository, PresenceStatus, UserRepository};
use crate::shared::error::AppError;

/// Outcome of a message delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Delivered to this many connections.
    Delivered(usize),
    /// The sender is muted in the room; nothing was delivered.
    Suppressed,
}

pub struct BroadcastRouter<U, M>
where
    U: UserRepository,
    M: MembershipRepository,
{
    registry: Arc<SessionRegistry>,
    user_repo: Arc<U>,
    membership_repo: Arc<M>,
}

impl<U, M> BroadcastRouter<U, M>
where
    U: UserRepository,
    M: MembershipRepository,
{
    pub fn new(registry: Arc<SessionRegistry>, user_repo: Arc<U>, membership_repo: Arc<M>) -> Self {
        Self {
            registry,
            user_repo,
            membership_repo,
        }
    }

    /// Deliver an event to every connection subscribed to the room,
    /// without exclusion. Used for membership notices, moderation status
    /// changes and room-destroyed events.
    pub fn notify(&self, room_id: i64, event: ServerEvent) {
        for connection in self.registry.connections_in_room(room_id) {
            connection.send(event.clone());
        }
    }

    /// Deliver a chat message to the room, filtered by the sender's mute
    /// state and the block relation.
    ///
    /// Short-circuits entirely (delivering nothing but still succeeding)
    /// when the sender is currently muted. Otherwise the message goes to
    /// every subscribed connection whose owning identity has not blocked
    /// the sender; the sender's own connections are included.
    pub async fn deliver_message(
        &self,
        sender_uid: i64,
        room_id: i64,
        content: &str,
    ) -> Result<Delivery, AppError> {
        let muted = self
            .membership_repo
            .find(room_id, sender_uid)
            .await?
            .map(|m| m.is_muted_at(Utc::now()))
            .unwrap_or(false);
        if muted {
            tracing::debug!(sender_uid, room_id, "Message suppressed: sender is muted");
            return Ok(Delivery::Suppressed);
        }

        let exclude = self.user_repo.find_blockers(sender_uid).await?;
        let message = ChatMessage::new(room_id, sender_uid, content);

        let mut delivered = 0;
        for connection in self.registry.connections_in_room(room_id) {
            if exclude.contains(&connection.user_id) {
                continue;
            }
            if connection.send(ServerEvent::Receive(message.clone())) {
                delivered += 1;
            }
        }

        tracing::debug!(sender_uid, room_id, delivered, "Message delivered");
        Ok(Delivery::Delivered(delivered))
    }

    /// Broadcast a presence transition to every connected peer (global,
    /// not room-scoped).
    pub fn broadcast_status(&self, uid: i64, status: PresenceStatus) {
        let event = ServerEvent::Status(UserStatus { uid, status });
        for connection in self.registry.all_connections() {
            connection.send(event.clone());
        }
    }
}
