//! Room entity and repository trait.
//!
//! Maps to the `rooms` table. DM rooms carry the normalized participant
//! pair so the database can enforce at most one DM room per unordered pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Visibility and join policy of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomType {
    /// Joinable by anyone.
    Public,
    /// Joinable with the room password.
    Protected,
    /// Joinable only through an invite.
    Private,
    /// 1:1 room; never created through the generic create path.
    Dm,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Public => "PUBLIC",
            RoomType::Protected => "PROTECTED",
            RoomType::Private => "PRIVATE",
            RoomType::Dm => "DM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PUBLIC" => Some(RoomType::Public),
            "PROTECTED" => Some(RoomType::Protected),
            "PRIVATE" => Some(RoomType::Private),
            "DM" => Some(RoomType::Dm),
            _ => None,
        }
    }
}

/// A chat room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Room ID (database-assigned)
    pub id: i64,

    /// Display title
    pub title: String,

    /// Join policy
    pub room_type: RoomType,

    /// Argon2 hash of the room password; present only for Protected rooms
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// User who created the room
    pub owner_id: i64,

    /// Normalized participant pair, present only on DM rooms. Persisted so
    /// message delivery can force both sides back in even after one left.
    pub dm_participants: Option<(i64, i64)>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Deterministic title for the DM room of an identity pair.
    pub fn dm_title(a: i64, b: i64) -> String {
        format!("DM_with_{}_and_{}", a, b)
    }
}

/// Normalize an identity pair so (a, b) and (b, a) address the same DM room.
pub fn dm_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Repository trait for Room data access operations.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Find a room by its ID.
    async fn find_by_id(&self, room_id: i64) -> Result<Option<Room>, AppError>;

    /// Create a non-DM room.
    async fn create(
        &self,
        title: &str,
        room_type: RoomType,
        password_hash: Option<&str>,
        owner_id: i64,
    ) -> Result<Room, AppError>;

    /// Create the DM room for an identity pair.
    ///
    /// Fails with `Conflict` on the uniqueness constraint when a concurrent
    /// caller created the pair's room first; callers fall back to
    /// `find_dm_by_pair`.
    async fn create_dm(&self, a: i64, b: i64, owner_id: i64) -> Result<Room, AppError>;

    /// Find the DM room for an unordered identity pair.
    async fn find_dm_by_pair(&self, a: i64, b: i64) -> Result<Option<Room>, AppError>;

    /// Update the password hash and join policy of a room.
    async fn set_password(
        &self,
        room_id: i64,
        password_hash: Option<&str>,
        room_type: RoomType,
    ) -> Result<(), AppError>;

    /// Delete a room.
    async fn delete(&self, room_id: i64) -> Result<(), AppError>;
}
