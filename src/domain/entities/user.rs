//! User-facing port of the chat core.
//!
//! Users are owned elsewhere; the core only needs nickname resolution, the
//! block relation (read-only, for broadcast exclusion) and a persisted
//! mirror of the presence status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Presence of a user as seen by every connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PresenceStatus {
    Offline,
    Online,
    InGame,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Offline => "OFFLINE",
            PresenceStatus::Online => "ONLINE",
            PresenceStatus::InGame => "INGAME",
        }
    }
}

/// Repository trait for the user queries the chat core consumes.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Resolve a nickname to a user ID.
    async fn find_uid_by_nickname(&self, nickname: &str) -> Result<Option<i64>, AppError>;

    /// Users who have blocked the given user. Consulted only to compute
    /// broadcast exclusion; never mutated by this core.
    async fn find_blockers(&self, user_id: i64) -> Result<Vec<i64>, AppError>;

    /// Persist the presence status mirror.
    async fn set_status(&self, user_id: i64, status: PresenceStatus) -> Result<(), AppError>;
}
