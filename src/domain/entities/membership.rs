//! Room membership entity and repository trait.
//!
//! Maps to the `room_members` table:
//! - room_id: BIGINT NOT NULL REFERENCES rooms(id) (composite PK)
//! - user_id: BIGINT NOT NULL (composite PK)
//! - role: VARCHAR(16) NOT NULL
//! - mute_until: TIMESTAMPTZ NULL
//! - joined_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Authority level of a member within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomRole {
    Owner,
    Admin,
    Member,
}

impl RoomRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomRole::Owner => "OWNER",
            RoomRole::Admin => "ADMIN",
            RoomRole::Member => "MEMBER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OWNER" => Some(RoomRole::Owner),
            "ADMIN" => Some(RoomRole::Admin),
            "MEMBER" => Some(RoomRole::Member),
            _ => None,
        }
    }

    /// Owners and admins may run moderation commands.
    pub fn can_moderate(&self) -> bool {
        matches!(self, RoomRole::Owner | RoomRole::Admin)
    }
}

/// Represents a user's membership in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Room ID (part of composite primary key)
    pub room_id: i64,

    /// User ID (part of composite primary key)
    pub user_id: i64,

    /// Authority level
    pub role: RoomRole,

    /// End of the active mute window, if any. Expired values are treated
    /// as unmuted without requiring an explicit unmute (lazy expiry).
    pub mute_until: Option<DateTime<Utc>>,

    /// When the user joined the room
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    /// Create a plain member row.
    pub fn new(room_id: i64, user_id: i64, role: RoomRole) -> Self {
        Self {
            room_id,
            user_id,
            role,
            mute_until: None,
            joined_at: Utc::now(),
        }
    }

    /// Whether the member is muted at the given instant.
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.mute_until.map(|until| until > now).unwrap_or(false)
    }
}

/// Repository trait for Membership data access operations.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Find a membership by room and user ID.
    async fn find(&self, room_id: i64, user_id: i64) -> Result<Option<Membership>, AppError>;

    /// Find all rooms a user is a member of.
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Membership>, AppError>;

    /// Find the full roster of a room.
    async fn find_by_room(&self, room_id: i64) -> Result<Vec<Membership>, AppError>;

    /// Insert a membership row; a no-op if the row already exists.
    async fn upsert(&self, membership: &Membership) -> Result<(), AppError>;

    /// Change a member's role.
    async fn set_role(&self, room_id: i64, user_id: i64, role: RoomRole) -> Result<(), AppError>;

    /// Set or clear the mute window end.
    async fn set_mute_until(
        &self,
        room_id: i64,
        user_id: i64,
        mute_until: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    /// Remove a membership row. Returns whether a row was removed.
    async fn delete(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Remove the whole roster of a room (owner-leave teardown).
    async fn delete_by_room(&self, room_id: i64) -> Result<(), AppError>;

    /// Count members of a room.
    async fn count_by_room(&self, room_id: i64) -> Result<i64, AppError>;
}
