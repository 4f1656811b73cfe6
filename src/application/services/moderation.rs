//! Moderation Engine
//!
//! Authority checks, role transitions, mute windows, the ban list and room
//! password management. Every check+mutate pair for a room runs inside
//! that room's async mutex so a demoted admin's in-flight privileged
//! action cannot land after the demotion.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::application::dto::PasswordCommand;
use crate::application::services::session_registry::SessionRegistry;
use crate::domain::{
    BanRepository, Membership, MembershipRepository, RoomRepository, RoomRole, RoomType,
};
use crate::shared::error::AppError;
use crate::shared::password;

/// Per-room mutual-exclusion scopes for authority-mutating operations.
/// Cross-room operations never contend with each other.
struct RoomLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl RoomLocks {
    fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn for_room(&self, room_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn forget(&self, room_id: i64) {
        self.locks.remove(&room_id);
    }
}

pub struct ModerationService<R, M, B>
where
    R: RoomRepository,
    M: MembershipRepository,
    B: BanRepository,
{
    registry: Arc<SessionRegistry>,
    room_repo: Arc<R>,
    membership_repo: Arc<M>,
    ban_repo: Arc<B>,
    locks: RoomLocks,
}

impl<R, M, B> ModerationService<R, M, B>
where
    R: RoomRepository,
    M: MembershipRepository,
    B: BanRepository,
{
    pub fn new(
        registry: Arc<SessionRegistry>,
        room_repo: Arc<R>,
        membership_repo: Arc<M>,
        ban_repo: Arc<B>,
    ) -> Self {
        Self {
            registry,
            room_repo,
            membership_repo,
            ban_repo,
            locks: RoomLocks::new(),
        }
    }

    /// The actor's membership, required to hold Owner or Admin authority.
    async fn require_moderator(&self, actor: i64, room_id: i64) -> Result<Membership, AppError> {
        let membership = self
            .membership_repo
            .find(room_id, actor)
            .await?
            .ok_or_else(|| AppError::Forbidden("You are not a member of this room".into()))?;
        if !membership.role.can_moderate() {
            return Err(AppError::Forbidden("You are not an admin".into()));
        }
        Ok(membership)
    }

    async fn require_member(&self, uid: i64, room_id: i64) -> Result<Membership, AppError> {
        self.membership_repo
            .find(room_id, uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} is not in room {}", uid, room_id)))
    }

    /// Grant admin authority to a member. Caller must be Owner/Admin;
    /// the target must not hold Owner. Granting to an admin is a no-op.
    pub async fn grant_admin(&self, actor: i64, target: i64, room_id: i64) -> Result<(), AppError> {
        let lock = self.locks.for_room(room_id);
        let _guard = lock.lock().await;

        self.require_moderator(actor, room_id).await?;
        let membership = self.require_member(target, room_id).await?;
        if membership.role == RoomRole::Owner {
            return Err(AppError::Forbidden("Owner role cannot be changed".into()));
        }
        self.membership_repo
            .set_role(room_id, target, RoomRole::Admin)
            .await?;

        tracing::info!(actor, target, room_id, "Admin granted");
        Ok(())
    }

    /// Revoke admin authority from a member. Same authority rules as
    /// `grant_admin`.
    pub async fn revoke_admin(&self, actor: i64, target: i64, room_id: i64) -> Result<(), AppError> {
        let lock = self.locks.for_room(room_id);
        let _guard = lock.lock().await;

        self.require_moderator(actor, room_id).await?;
        let membership = self.require_member(target, room_id).await?;
        if membership.role == RoomRole::Owner {
            return Err(AppError::Forbidden("Owner role cannot be changed".into()));
        }
        self.membership_repo
            .set_role(room_id, target, RoomRole::Member)
            .await?;

        tracing::info!(actor, target, room_id, "Admin revoked");
        Ok(())
    }

    /// Mute a member for `seconds` from now. Returns the window end.
    pub async fn mute(
        &self,
        actor: i64,
        target: i64,
        room_id: i64,
        seconds: i64,
    ) -> Result<DateTime<Utc>, AppError> {
        if seconds <= 0 {
            return Err(AppError::BadRequest("Mute duration must be positive".into()));
        }
        let lock = self.locks.for_room(room_id);
        let _guard = lock.lock().await;

        self.require_moderator(actor, room_id).await?;
        self.require_member(target, room_id).await?;

        let until = Utc::now() + Duration::seconds(seconds);
        self.membership_repo
            .set_mute_until(room_id, target, Some(until))
            .await?;

        tracing::info!(actor, target, room_id, %until, "User muted");
        Ok(until)
    }

    /// Clear a member's mute window.
    pub async fn unmute(&self, actor: i64, target: i64, room_id: i64) -> Result<(), AppError> {
        let lock = self.locks.for_room(room_id);
        let _guard = lock.lock().await;

        self.require_moderator(actor, room_id).await?;
        self.require_member(target, room_id).await?;
        self.membership_repo
            .set_mute_until(room_id, target, None)
            .await?;

        tracing::info!(actor, target, room_id, "User unmuted");
        Ok(())
    }

    /// Whether the user is muted in the room right now (lazy expiry: an
    /// elapsed window reads as unmuted without an explicit unmute).
    pub async fn is_muted(&self, uid: i64, room_id: i64) -> Result<bool, AppError> {
        Ok(self
            .membership_repo
            .find(room_id, uid)
            .await?
            .map(|m| m.is_muted_at(Utc::now()))
            .unwrap_or(false))
    }

    /// Ban a user from a room: insert the ban entry, delete the
    /// membership row and force every live connection of the target out
    /// of the room group. The room owner can never be banned.
    pub async fn ban(&self, actor: i64, target: i64, room_id: i64) -> Result<(), AppError> {
        let lock = self.locks.for_room(room_id);
        let _guard = lock.lock().await;

        self.require_moderator(actor, room_id).await?;

        let room = self
            .room_repo
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;
        let target_role = self
            .membership_repo
            .find(room_id, target)
            .await?
            .map(|m| m.role);
        if target == room.owner_id || target_role == Some(RoomRole::Owner) {
            return Err(AppError::Forbidden("Owner cannot be banned".into()));
        }

        self.ban_repo.insert(room_id, target).await?;
        self.membership_repo.delete(room_id, target).await?;
        self.registry.unsubscribe_user(target, room_id);

        tracing::info!(actor, target, room_id, "User banned");
        Ok(())
    }

    /// Lift a ban. Does not re-add the membership.
    pub async fn unban(&self, actor: i64, target: i64, room_id: i64) -> Result<(), AppError> {
        let lock = self.locks.for_room(room_id);
        let _guard = lock.lock().await;

        self.require_moderator(actor, room_id).await?;
        self.ban_repo.remove(room_id, target).await?;

        tracing::info!(actor, target, room_id, "User unbanned");
        Ok(())
    }

    /// Add, change or remove the room password. ADD/MODIFY store a fresh
    /// hash and flip the room to Protected; DELETE clears the hash and
    /// flips it to Public.
    pub async fn set_password(
        &self,
        actor: i64,
        room_id: i64,
        command: PasswordCommand,
        supplied: Option<&str>,
    ) -> Result<(), AppError> {
        let lock = self.locks.for_room(room_id);
        let _guard = lock.lock().await;

        self.require_moderator(actor, room_id).await?;

        match command {
            PasswordCommand::Add | PasswordCommand::Modify => {
                let plain = supplied
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| AppError::BadRequest("Password required".into()))?;
                let hash = password::hash_password(plain)?;
                self.room_repo
                    .set_password(room_id, Some(&hash), RoomType::Protected)
                    .await?;
            }
            PasswordCommand::Delete => {
                self.room_repo
                    .set_password(room_id, None, RoomType::Public)
                    .await?;
            }
        }

        tracing::info!(actor, room_id, ?command, "Room password updated");
        Ok(())
    }

    /// Whether the user holds the Owner role in the room.
    pub async fn is_owner(&self, uid: i64, room_id: i64) -> Result<bool, AppError> {
        Ok(self
            .membership_repo
            .find(room_id, uid)
            .await?
            .map(|m| m.role == RoomRole::Owner)
            .unwrap_or(false))
    }

    /// Release the room's lock entry after teardown.
    pub fn forget_room(&self, room_id: i64) {
        self.locks.forget(room_id);
    }
}
