//! Room ban entry and repository trait.
//!
//! Maps to the `room_bans` table: a (room_id, user_id) pair whose presence
//! blocks re-join via password or invite until explicitly removed. The room
//! owner never appears here; the moderation engine rejects that upstream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A ban entry for a user in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    pub room_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for ban-list data access operations.
#[async_trait]
pub trait BanRepository: Send + Sync {
    /// Insert a ban entry; a no-op if the pair is already banned.
    async fn insert(&self, room_id: i64, user_id: i64) -> Result<(), AppError>;

    /// Remove a ban entry. Returns whether an entry was removed.
    async fn remove(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Whether the pair is currently banned.
    async fn exists(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Remove every ban entry of a room (room teardown).
    async fn delete_by_room(&self, room_id: i64) -> Result<(), AppError>;
}
