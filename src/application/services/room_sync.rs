//! Room Membership Synchronizer
//!
//! Keeps every live connection of an identity consistent with its
//! persisted room memberships: bulk join across the connection set, bulk
//! leave, reconnect resubscription and whole-room teardown.

use std::sync::Arc;

use crate::application::services::session_registry::{Connection, SessionRegistry};
use crate::domain::{
    BanRepository, Membership, MembershipRepository, RoomRepository, RoomRole, RoomType,
};
use crate::shared::error::AppError;
use crate::shared::password;

pub struct RoomSyncService<R, M, B>
where
    R: RoomRepository,
    M: MembershipRepository,
    B: BanRepository,
{
    registry: Arc<SessionRegistry>,
    room_repo: Arc<R>,
    membership_repo: Arc<M>,
    ban_repo: Arc<B>,
}

impl<R, M, B> RoomSyncService<R, M, B>
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
        }
    }

    /// Join a room with every live connection of the identity and upsert
    /// the persisted membership row.
    ///
    /// The ban list is checked unconditionally. Password verification
    /// applies to Protected rooms unless the caller is already a member or
    /// is being force-joined (`forced`: invite or DM delivery, which
    /// bypasses the password but never the ban list). Private rooms admit
    /// only forced joins.
    ///
    /// Idempotent: re-joining subscribes nothing twice and re-inserts no
    /// row. Subscription is best-effort across the connection set; a
    /// single connection failing never aborts the others.
    pub async fn join_all(
        &self,
        uid: i64,
        room_id: i64,
        supplied_password: Option<&str>,
        forced: bool,
    ) -> Result<(), AppError> {
        if self.ban_repo.exists(room_id, uid).await? {
            return Err(AppError::Forbidden(format!(
                "User {} is banned from room {}",
                uid, room_id
            )));
        }

        let room = self
            .room_repo
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;

        let already_member = self.membership_repo.find(room_id, uid).await?.is_some();
        if !already_member {
            if !forced {
                match room.room_type {
                    RoomType::Protected => {
                        let supplied = supplied_password.ok_or_else(|| {
                            AppError::Forbidden("Room password required".into())
                        })?;
                        let hash = room.password_hash.as_deref().ok_or_else(|| {
                            AppError::Internal(format!(
                                "Protected room {} has no password hash",
                                room_id
                            ))
                        })?;
                        if !password::verify_password(supplied, hash)? {
                            return Err(AppError::Forbidden("Wrong room password".into()));
                        }
                    }
                    RoomType::Private | RoomType::Dm => {
                        return Err(AppError::Forbidden(
                            "Room can only be joined through an invite".into(),
                        ));
                    }
                    RoomType::Public => {}
                }
            }
            self.membership_repo
                .upsert(&Membership::new(room_id, uid, RoomRole::Member))
                .await?;
        }

        self.subscribe_connections(uid, room_id);
        Ok(())
    }

    /// Subscribe every live connection of the identity to the room group.
    pub fn subscribe_connections(&self, uid: i64, room_id: i64) {
        for connection in self.registry.connections_of(uid) {
            self.registry.subscribe(&connection.session_id, room_id);
        }
    }

    /// Leave a room with every live connection and delete the membership
    /// row. Removing the last membership tears the room down together
    /// with its bans and any remaining subscriptions.
    pub async fn leave_all(&self, uid: i64, room_id: i64) -> Result<(), AppError> {
        self.registry.unsubscribe_user(uid, room_id);

        let removed = self.membership_repo.delete(room_id, uid).await?;
        if removed && self.membership_repo.count_by_room(room_id).await? == 0 {
            tracing::info!(room_id, "Last member left; destroying room");
            self.destroy_room(room_id).await?;
        }
        Ok(())
    }

    /// Tear a room down atomically across the whole roster: every
    /// subscribed connection loses the group, then the membership rows,
    /// ban entries and the room row are deleted. This is the owner-leave
    /// path; it does not go through `leave_all` per member.
    pub async fn destroy_room(&self, room_id: i64) -> Result<(), AppError> {
        self.registry.drop_room(room_id);

        self.membership_repo.delete_by_room(room_id).await?;
        self.ban_repo.delete_by_room(room_id).await?;
        self.room_repo.delete(room_id).await?;

        tracing::info!(room_id, "Room destroyed");
        Ok(())
    }

    /// Subscribe a fresh connection to every room its identity is a
    /// persisted member of. Runs once per successful handshake.
    pub async fn resubscribe_on_connect(
        &self,
        connection: &Arc<Connection>,
    ) -> Result<Vec<i64>, AppError> {
        let memberships = self.membership_repo.find_by_user(connection.user_id).await?;
        let mut room_ids = Vec::with_capacity(memberships.len());
        for membership in memberships {
            self.registry
                .subscribe(&connection.session_id, membership.room_id);
            room_ids.push(membership.room_id);
        }
        tracing::debug!(
            user_id = connection.user_id,
            rooms = room_ids.len(),
            "Resubscribed connection to persisted memberships"
        );
        Ok(room_ids)
    }
}
