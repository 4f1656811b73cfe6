//! Room Repository Implementation
//!
//! PostgreSQL implementation of the RoomRepository trait. DM uniqueness is
//! enforced by the partial unique index on the normalized identity pair;
//! a violation surfaces as `Conflict` so callers can fall back to lookup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{dm_pair, Room, RoomRepository, RoomType};
use crate::shared::error::AppError;

/// Database row representation matching the `rooms` table schema.
#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: i64,
    title: String,
    room_type: String,
    password_hash: Option<String>,
    owner_id: i64,
    dm_uid_low: Option<i64>,
    dm_uid_high: Option<i64>,
    created_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_room(self) -> Result<Room, AppError> {
        let room_type = RoomType::parse(&self.room_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown room type in row: {}", self.room_type))
        })?;
        let dm_participants = match (self.dm_uid_low, self.dm_uid_high) {
            (Some(low), Some(high)) => Some((low, high)),
            _ => None,
        };
        Ok(Room {
            id: self.id,
            title: self.title,
            room_type,
            password_hash: self.password_hash,
            owner_id: self.owner_id,
            dm_participants,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL room repository implementation.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_by_id(&self, room_id: i64) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, title, room_type, password_hash, owner_id, dm_uid_low, dm_uid_high, created_at
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoomRow::into_room).transpose()
    }

    async fn create(
        &self,
        title: &str,
        room_type: RoomType,
        password_hash: Option<&str>,
        owner_id: i64,
    ) -> Result<Room, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO rooms (title, room_type, password_hash, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, room_type, password_hash, owner_id, dm_uid_low, dm_uid_high, created_at
            "#,
        )
        .bind(title)
        .bind(room_type.as_str())
        .bind(password_hash)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        row.into_room()
    }

    async fn create_dm(&self, a: i64, b: i64, owner_id: i64) -> Result<Room, AppError> {
        let (low, high) = dm_pair(a, b);
        let title = Room::dm_title(a, b);

        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO rooms (title, room_type, owner_id, dm_uid_low, dm_uid_high)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, room_type, password_hash, owner_id, dm_uid_low, dm_uid_high, created_at
            "#,
        )
        .bind(&title)
        .bind(RoomType::Dm.as_str())
        .bind(owner_id)
        .bind(low)
        .bind(high)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("DM room for {} and {} already exists", a, b))
            }
            _ => AppError::Database(e),
        })?;

        row.into_room()
    }

    async fn find_dm_by_pair(&self, a: i64, b: i64) -> Result<Option<Room>, AppError> {
        let (low, high) = dm_pair(a, b);

        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, title, room_type, password_hash, owner_id, dm_uid_low, dm_uid_high, created_at
            FROM rooms
            WHERE room_type = 'DM' AND dm_uid_low = $1 AND dm_uid_high = $2
            "#,
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoomRow::into_room).transpose()
    }

    async fn set_password(
        &self,
        room_id: i64,
        password_hash: Option<&str>,
        room_type: RoomType,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE rooms
            SET password_hash = $2, room_type = $3
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .bind(password_hash)
        .bind(room_type.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Room {} not found", room_id)));
        }
        Ok(())
    }

    async fn delete(&self, room_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
