use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{ConcurrencyToken, Room, RoomId, RoomSettings, UserId},
    Error, Result,
};

/// Room repository for database operations
#[derive(Clone)]
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, room: &Room) -> Result<Room> {
        let settings = serde_json::to_value(&room.settings)?;
        let row = sqlx::query(
            "INSERT INTO rooms (id, name, created_by, settings, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, name, created_by, settings, version, created_at, updated_at",
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(&room.created_by)
        .bind(settings)
        .bind(room.version)
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_room(&row)
    }

    pub async fn get(&self, room_id: &RoomId) -> Result<Option<Room>> {
        let row = sqlx::query(
            "SELECT id, name, created_by, settings, version, created_at, updated_at
             FROM rooms
             WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_room(&row)?)),
            None => Ok(None),
        }
    }

    /// Update room settings guarded by the version counter.
    ///
    /// The row is only written when the stored version equals `expected`;
    /// a concurrent writer that bumped the version first surfaces as
    /// `OptimisticLockConflict`.
    pub async fn update_settings(
        &self,
        room_id: &RoomId,
        settings: &RoomSettings,
        expected: ConcurrencyToken,
    ) -> Result<Room> {
        let settings = serde_json::to_value(settings)?;
        let row = sqlx::query(
            "UPDATE rooms
             SET settings = $2, version = version + 1, updated_at = $3
             WHERE id = $1 AND version = $4
             RETURNING id, name, created_by, settings, version, created_at, updated_at",
        )
        .bind(room_id)
        .bind(settings)
        .bind(chrono::Utc::now())
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_room(&row),
            None => {
                // Zero rows: either the room is gone or the version moved.
                if self.get(room_id).await?.is_some() {
                    Err(Error::OptimisticLockConflict)
                } else {
                    Err(Error::NotFound(format!("Room not found: {room_id}")))
                }
            }
        }
    }

    pub async fn delete(&self, room_id: &RoomId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_room(row: &PgRow) -> Result<Room> {
        let settings: serde_json::Value = row.try_get("settings").map_err(Error::Database)?;
        Ok(Room {
            id: row.try_get("id").map_err(Error::Database)?,
            name: row.try_get("name").map_err(Error::Database)?,
            created_by: row.try_get::<UserId, _>("created_by").map_err(Error::Database)?,
            settings: serde_json::from_value(settings)?,
            version: row.try_get("version").map_err(Error::Database)?,
            created_at: row.try_get("created_at").map_err(Error::Database)?,
            updated_at: row.try_get("updated_at").map_err(Error::Database)?,
        })
    }
}
