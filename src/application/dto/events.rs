//! Wire Event Catalogue
//!
//! Adjacently tagged envelopes exchanged over the gateway. Client frames
//! carry an optional `seq` the server echoes back in the ack, so every
//! handled frame is acknowledged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PresenceStatus, RoomType};

/// Frame received from a client.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    /// Client-chosen correlation number, echoed in the ack.
    #[serde(default)]
    pub seq: Option<u64>,

    #[serde(flatten)]
    pub event: ClientEvent,
}

/// Client-originated events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Authentication handshake; must be the first frame.
    Identify { token: String },

    /// Send a chat message to a room.
    Send { room_id: i64, content: String },

    /// Join a room, optionally supplying the room password.
    Join {
        room_id: i64,
        #[serde(default)]
        password: Option<String>,
    },

    /// Leave a room (destroys the room when the caller is the owner).
    Leave { room_id: i64 },

    /// Create a new non-DM room.
    Create {
        title: String,
        room_type: RoomType,
        #[serde(default)]
        password: Option<String>,
    },

    /// Invite a user (by nickname) into a room the caller is in.
    Invite { room_id: i64, nickname: String },

    /// Resolve or create the 1:1 room with another user.
    InviteDm { invitee: i64 },

    /// Grant admin authority to a member.
    AddAdmin { room_id: i64, uid: i64 },

    /// Revoke admin authority from a member.
    RemoveAdmin { room_id: i64, uid: i64 },

    /// Ban a member from a room.
    Ban { room_id: i64, uid: i64 },

    /// Lift a ban.
    Unban { room_id: i64, uid: i64 },

    /// Mute a member for a number of seconds.
    Mute {
        room_id: i64,
        uid: i64,
        seconds: i64,
    },

    /// Clear a member's mute window.
    Unmute { room_id: i64, uid: i64 },

    /// Add, change or remove the room password.
    Password {
        room_id: i64,
        command: PasswordCommand,
        #[serde(default)]
        password: Option<String>,
    },
}

/// Room password sub-commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PasswordCommand {
    Add,
    Modify,
    Delete,
}

/// Server-originated events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A chat message delivered to a room member.
    Receive(ChatMessage),

    /// Room notice ("join", "leave", "banned", "unbanned").
    Notice(ChatMessage),

    /// The room was destroyed by its owner.
    Destroyed(RoomUser),

    /// Global presence change of a user.
    Status(UserStatus),

    /// A member's moderation state changed within a room.
    ChatUserStatus(ChatUserStatusChanged),

    /// Acknowledgment of a client frame.
    Ack(Ack),
}

/// Chat message payload, also used for notices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_id: i64,
    pub sender_uid: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(room_id: i64, sender_uid: i64, content: impl Into<String>) -> Self {
        Self {
            room_id,
            sender_uid,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// (room, user) pair payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomUser {
    pub room_id: i64,
    pub uid: i64,
}

/// Global presence payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatus {
    pub uid: i64,
    pub status: PresenceStatus,
}

/// Moderation state change broadcast to a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUserStatusChanged {
    pub room_id: i64,
    pub uid: i64,
    #[serde(rename = "type")]
    pub change: ChatUserEvent,
}

/// Kinds of per-room member state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatUserEvent {
    AdminAdded,
    AdminRemoved,
    Muted,
    Unmuted,
}

/// Acknowledgment payload for a handled client frame.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    pub status: u16,

    /// Diagnostic payload where useful; e.g. the existing room id on a
    /// duplicate DM invite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok(seq: Option<u64>) -> Self {
        Self {
            seq,
            status: 200,
            room_id: None,
            message: None,
        }
    }

    pub fn with_room(mut self, room_id: i64) -> Self {
        self.room_id = Some(room_id);
        self
    }
}
