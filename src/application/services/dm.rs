//! Direct-Message Room Resolver
//!
//! Resolves the 1:1 room for an identity pair or atomically creates it.
//! At most one DM room exists per unordered pair; concurrent creation
//! resolves through the persistence-level uniqueness constraint with a
//! fallback lookup on conflict.

use std::sync::Arc;

use crate::application::services::room_sync::RoomSyncService;
use crate::domain::{
    BanRepository, Membership, MembershipRepository, Room, RoomRepository, RoomRole,
};
use crate::shared::error::AppError;

/// How the resolved DM room relates to the inviter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmOutcome {
    /// A fresh room was created and both sides subscribed.
    Created,
    /// The room existed; the inviter had left it and was re-joined.
    Rejoined,
    /// The room exists and the inviter is already a member.
    AlreadyMember,
}

pub struct DmService<R, M, B>
where
    R: RoomRepository,
    M: MembershipRepository,
    B: BanRepository,
{
    room_repo: Arc<R>,
    membership_repo: Arc<M>,
    sync: Arc<RoomSyncService<R, M, B>>,
}

impl<R, M, B> DmService<R, M, B>
where
    R: RoomRepository,
    M: MembershipRepository,
    B: BanRepository,
{
    pub fn new(
        room_repo: Arc<R>,
        membership_repo: Arc<M>,
        sync: Arc<RoomSyncService<R, M, B>>,
    ) -> Self {
        Self {
            room_repo,
            membership_repo,
            sync,
        }
    }

    /// Return the DM room for the pair, creating it if needed.
    pub async fn resolve_or_create(
        &self,
        inviter: i64,
        invitee: i64,
    ) -> Result<(Room, DmOutcome), AppError> {
        if inviter == invitee {
            return Err(AppError::BadRequest("Cannot open a DM with yourself".into()));
        }

        if let Some(room) = self.room_repo.find_dm_by_pair(inviter, invitee).await? {
            if self
                .membership_repo
                .find(room.id, inviter)
                .await?
                .is_some()
            {
                return Ok((room, DmOutcome::AlreadyMember));
            }
            // The inviter previously left the DM room; pull them back in.
            self.sync.join_all(inviter, room.id, None, true).await?;
            return Ok((room, DmOutcome::Rejoined));
        }

        let room = match self.room_repo.create_dm(inviter, invitee, inviter).await {
            Ok(room) => room,
            Err(AppError::Conflict(_)) => {
                // Lost the creation race; the winner's room is authoritative.
                let room = self
                    .room_repo
                    .find_dm_by_pair(inviter, invitee)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("DM room vanished after uniqueness conflict".into())
                    })?;
                self.ensure_joined(inviter, room.id).await?;
                self.ensure_joined(invitee, room.id).await?;
                return Ok((room, DmOutcome::Rejoined));
            }
            Err(e) => return Err(e),
        };

        self.ensure_joined(inviter, room.id).await?;
        self.ensure_joined(invitee, room.id).await?;

        tracing::info!(inviter, invitee, room_id = room.id, "DM room created");
        Ok((room, DmOutcome::Created))
    }

    /// Persist the membership and subscribe the identity's connections.
    /// Both participants enter as plain members; DM rooms have no Owner
    /// row, so the last one to leave tears the room down.
    async fn ensure_joined(&self, uid: i64, room_id: i64) -> Result<(), AppError> {
        self.membership_repo
            .upsert(&Membership::new(room_id, uid, RoomRole::Member))
            .await?;
        self.sync.subscribe_connections(uid, room_id);
        Ok(())
    }
}
