//! Membership Repository Implementation
//!
//! PostgreSQL implementation of the MembershipRepository trait. Inserts
//! are idempotent (`ON CONFLICT DO NOTHING`) so bulk joins never fail on
//! an existing row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Membership, MembershipRepository, RoomRole};
use crate::shared::error::AppError;

/// Database row representation matching the `room_members` table schema.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    room_id: i64,
    user_id: i64,
    role: String,
    mute_until: Option<DateTime<Utc>>,
    joined_at: DateTime<Utc>,
}

impl MembershipRow {
    fn into_membership(self) -> Result<Membership, AppError> {
        let role = RoomRole::parse(&self.role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role in row: {}", self.role)))?;
        Ok(Membership {
            room_id: self.room_id,
            user_id: self.user_id,
            role,
            mute_until: self.mute_until,
            joined_at: self.joined_at,
        })
    }
}

/// PostgreSQL membership repository implementation.
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn find(&self, room_id: i64, user_id: i64) -> Result<Option<Membership>, AppError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT room_id, user_id, role, mute_until, joined_at
            FROM room_members
            WHERE room_id = $1 AND user_id = $2
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MembershipRow::into_membership).transpose()
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Membership>, AppError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT room_id, user_id, role, mute_until, joined_at
            FROM room_members
            WHERE user_id = $1
            ORDER BY joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MembershipRow::into_membership).collect()
    }

    async fn find_by_room(&self, room_id: i64) -> Result<Vec<Membership>, AppError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT room_id, user_id, role, mute_until, joined_at
            FROM room_members
            WHERE room_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MembershipRow::into_membership).collect()
    }

    async fn upsert(&self, membership: &Membership) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id, role, mute_until, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(membership.room_id)
        .bind(membership.user_id)
        .bind(membership.role.as_str())
        .bind(membership.mute_until)
        .bind(membership.joined_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_role(&self, room_id: i64, user_id: i64, role: RoomRole) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE room_members
            SET role = $3
            WHERE room_id = $1 AND user_id = $2
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Member not found in room {} for user {}",
                room_id, user_id
            )));
        }
        Ok(())
    }

    async fn set_mute_until(
        &self,
        room_id: i64,
        user_id: i64,
        mute_until: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE room_members
            SET mute_until = $3
            WHERE room_id = $1 AND user_id = $2
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(mute_until)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Member not found in room {} for user {}",
                room_id, user_id
            )));
        }
        Ok(())
    }

    async fn delete(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_room(&self, room_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM room_members WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_by_room(&self, room_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM room_members WHERE room_id = $1")
                .bind(room_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
