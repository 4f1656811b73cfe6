//! Presence Tracker
//!
//! Derives a user's presence from Session Registry occupancy and the
//! external game-status signal, persists the status mirror and broadcasts
//! exactly once per transition.

use std::sync::Arc;

use dashmap::DashSet;

use crate::application::services::broadcast::BroadcastRouter;
use crate::application::services::session_registry::SessionRegistry;
use crate::domain::{MembershipRepository, PresenceStatus, UserRepository};
use crate::shared::error::AppError;

pub struct PresenceService<U, M>
where
    U: UserRepository,
    M: MembershipRepository,
{
    registry: Arc<SessionRegistry>,
    router: Arc<BroadcastRouter<U, M>>,
    user_repo: Arc<U>,
    /// Identities currently reported in-game by the external signal.
    /// Authoritative while registry occupancy is nonzero.
    in_game: DashSet<i64>,
}

impl<U, M> PresenceService<U, M>
where
    U: UserRepository,
    M: MembershipRepository,
{
    pub fn new(
        registry: Arc<SessionRegistry>,
        router: Arc<BroadcastRouter<U, M>>,
        user_repo: Arc<U>,
    ) -> Self {
        Self {
            registry,
            router,
            user_repo,
            in_game: DashSet::new(),
        }
    }

    fn current_status(&self, uid: i64) -> PresenceStatus {
        if self.in_game.contains(&uid) {
            PresenceStatus::InGame
        } else if self.registry.is_online(uid) {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline
        }
    }

    /// Persist and broadcast the user's current status. The mirror write
    /// happens first; on failure the error propagates and no broadcast
    /// fires.
    async fn publish(&self, uid: i64) -> Result<PresenceStatus, AppError> {
        let status = self.current_status(uid);
        self.user_repo.set_status(uid, status).await?;
        self.router.broadcast_status(uid, status);
        tracing::debug!(uid, status = status.as_str(), "Presence transition");
        Ok(status)
    }

    /// A connection finished its handshake. Broadcasts only when this was
    /// the identity's first live connection.
    pub async fn on_connection_added(&self, uid: i64, first: bool) -> Result<(), AppError> {
        if first {
            self.publish(uid).await?;
        }
        Ok(())
    }

    /// A connection went away. Broadcasts only when this was the
    /// identity's last live connection; the game signal keeps the status
    /// In-Game across that transition if it is still set.
    pub async fn on_connection_removed(&self, uid: i64, last: bool) -> Result<(), AppError> {
        if last {
            self.publish(uid).await?;
        }
        Ok(())
    }

    /// External game subsystem reports the user entered a game.
    pub async fn on_game_started(&self, uid: i64) -> Result<(), AppError> {
        if self.in_game.insert(uid) {
            self.publish(uid).await?;
        }
        Ok(())
    }

    /// External game subsystem reports the user's game ended. Re-evaluates
    /// against registry occupancy: Online if any connection remains,
    /// Offline otherwise.
    pub async fn on_game_ended(&self, uid: i64) -> Result<(), AppError> {
        if self.in_game.remove(&uid).is_some() {
            self.publish(uid).await?;
        }
        Ok(())
    }

    /// Presence as currently derived, without publishing.
    pub fn status_of(&self, uid: i64) -> PresenceStatus {
        self.current_status(uid)
    }
}
