use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{PermissionMask, Role, RoomId, RoomMember, UserId},
    service::authorization::MembershipLookup,
    Error, Result,
};

/// Room member repository for database operations
#[derive(Clone)]
pub struct RoomMemberRepository {
    pool: PgPool,
}

impl RoomMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add user to room with role. Rejoining after a leave re-creates the
    /// record; rejoining while banned keeps the ban marker intact.
    pub async fn add(&self, member: &RoomMember) -> Result<RoomMember> {
        let row = sqlx::query(
            "INSERT INTO room_members (
                room_id, user_id, role,
                granted_permissions, denied_permissions,
                banned, banned_at, banned_by,
                joined_at, version
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (room_id, user_id) DO UPDATE
             SET
                role = EXCLUDED.role,
                granted_permissions = EXCLUDED.granted_permissions,
                denied_permissions = EXCLUDED.denied_permissions,
                version = room_members.version + 1
             RETURNING
                room_id, user_id, role,
                granted_permissions, denied_permissions,
                banned, banned_at, banned_by,
                joined_at, version",
        )
        .bind(&member.room_id)
        .bind(&member.user_id)
        .bind(member.role)
        .bind(member.granted_permissions)
        .bind(member.denied_permissions)
        .bind(member.banned)
        .bind(member.banned_at)
        .bind(&member.banned_by)
        .bind(member.joined_at)
        .bind(member.version)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_member(&row)
    }

    /// Get the membership record for a (room, user) pair, banned included.
    /// Plain read; no row lock, no write-back expected.
    pub async fn get(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<RoomMember>> {
        let row = sqlx::query(
            "SELECT
                room_id, user_id, role,
                granted_permissions, denied_permissions,
                banned, banned_at, banned_by,
                joined_at, version
             FROM room_members
             WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_member(&row)?)),
            None => Ok(None),
        }
    }

    /// List non-banned members of a room
    pub async fn list(&self, room_id: &RoomId) -> Result<Vec<RoomMember>> {
        let rows = sqlx::query(
            "SELECT
                room_id, user_id, role,
                granted_permissions, denied_permissions,
                banned, banned_at, banned_by,
                joined_at, version
             FROM room_members
             WHERE room_id = $1 AND banned = FALSE
             ORDER BY joined_at",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_member).collect()
    }

    /// Remove a membership record (leave/kick)
    pub async fn remove(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Ban: the record stays, flagged, so the ban is enforceable on every
    /// later request and can be lifted.
    pub async fn set_banned(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        banned_by: Option<&UserId>,
        banned: bool,
    ) -> Result<bool> {
        let (banned_at, banned_by) = if banned {
            (Some(chrono::Utc::now()), banned_by)
        } else {
            (None, None)
        };

        let result = sqlx::query(
            "UPDATE room_members
             SET banned = $3, banned_at = $4, banned_by = $5, version = version + 1
             WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(banned)
        .bind(banned_at)
        .bind(banned_by)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_role(&self, room_id: &RoomId, user_id: &UserId, role: Role) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE room_members
             SET role = $3, version = version + 1
             WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_permissions(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        granted: PermissionMask,
        denied: PermissionMask,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE room_members
             SET granted_permissions = $3, denied_permissions = $4, version = version + 1
             WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(granted)
        .bind(denied)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_member(row: &PgRow) -> Result<RoomMember> {
        Ok(RoomMember {
            room_id: row.try_get("room_id").map_err(Error::Database)?,
            user_id: row.try_get("user_id").map_err(Error::Database)?,
            role: row.try_get("role").map_err(Error::Database)?,
            granted_permissions: row
                .try_get("granted_permissions")
                .map_err(Error::Database)?,
            denied_permissions: row.try_get("denied_permissions").map_err(Error::Database)?,
            banned: row.try_get("banned").map_err(Error::Database)?,
            banned_at: row.try_get("banned_at").map_err(Error::Database)?,
            banned_by: row.try_get("banned_by").map_err(Error::Database)?,
            joined_at: row.try_get("joined_at").map_err(Error::Database)?,
            version: row.try_get("version").map_err(Error::Database)?,
        })
    }
}

#[async_trait]
impl MembershipLookup for RoomMemberRepository {
    async fn find_membership(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
    ) -> Result<Option<RoomMember>> {
        self.get(room_id, user_id).await
    }
}
