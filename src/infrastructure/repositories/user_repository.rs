//! User Repository Implementation
//!
//! PostgreSQL implementation of the user queries the chat core consumes:
//! nickname resolution, the block relation (read-only) and the persisted
//! presence status mirror.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{PresenceStatus, UserRepository};
use crate::shared::error::AppError;

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_uid_by_nickname(&self, nickname: &str) -> Result<Option<i64>, AppError> {
        let uid = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE nickname = $1")
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await?;

        Ok(uid)
    }

    async fn find_blockers(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let blockers = sqlx::query_scalar::<_, i64>(
            "SELECT blocker_id FROM user_blocks WHERE blocked_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(blockers)
    }

    async fn set_status(&self, user_id: i64, status: PresenceStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET status = $2 WHERE id = $1")
            .bind(user_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
