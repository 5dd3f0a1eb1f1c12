//! Room and membership orchestration

use crate::{
    models::{
        ConcurrencyToken, PermissionMask, Role, Room, RoomId, RoomMember, RoomSettings, UserId,
    },
    repository::{RoomMemberRepository, RoomRepository},
    Error, Result,
};

/// Room management service layered over the repositories.
///
/// Authorization decisions happen in the HTTP layer; this service enforces
/// only structural invariants (the owner cannot be kicked, banned, or
/// demoted by role/permission edits).
#[derive(Clone)]
pub struct RoomService {
    rooms: RoomRepository,
    members: RoomMemberRepository,
}

impl RoomService {
    pub fn new(rooms: RoomRepository, members: RoomMemberRepository) -> Self {
        Self { rooms, members }
    }

    /// Create a room; the creator becomes its Owner member.
    pub async fn create_room(
        &self,
        name: String,
        created_by: UserId,
        settings: RoomSettings,
    ) -> Result<(Room, RoomMember)> {
        let room = self
            .rooms
            .create(&Room::new(name, created_by.clone(), settings))
            .await?;

        let owner = self
            .members
            .add(&RoomMember::new(room.id.clone(), created_by, Role::Owner))
            .await?;

        tracing::info!(room_id = %room.id, owner = %owner.user_id, "room created");
        Ok((room, owner))
    }

    pub async fn get_room(&self, room_id: &RoomId) -> Result<Room> {
        self.rooms
            .get(room_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Room not found: {room_id}")))
    }

    /// Update settings guarded by the client-presented concurrency token.
    pub async fn update_settings(
        &self,
        room_id: &RoomId,
        settings: RoomSettings,
        expected: ConcurrencyToken,
    ) -> Result<Room> {
        let room = self.rooms.update_settings(room_id, &settings, expected).await?;
        tracing::info!(room_id = %room.id, version = %room.version, "room settings updated");
        Ok(room)
    }

    pub async fn delete_room(&self, room_id: &RoomId) -> Result<()> {
        if !self.rooms.delete(room_id).await? {
            return Err(Error::NotFound(format!("Room not found: {room_id}")));
        }
        tracing::info!(room_id = %room_id, "room deleted");
        Ok(())
    }

    /// Join as a Player. A banned record blocks rejoining until the ban is
    /// lifted.
    pub async fn join_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<RoomMember> {
        // Room must exist before a membership can be attached to it.
        self.get_room(room_id).await?;

        if let Some(existing) = self.members.get(room_id, user_id).await? {
            if existing.is_banned() {
                return Err(Error::Authorization("Banned from this room".to_string()));
            }
            return Ok(existing);
        }

        let member = self
            .members
            .add(&RoomMember::new(room_id.clone(), user_id.clone(), Role::Player))
            .await?;
        tracing::info!(room_id = %room_id, user_id = %user_id, "member joined");
        Ok(member)
    }

    /// Invite: create a Player membership for another user.
    pub async fn invite_member(&self, room_id: &RoomId, target: &UserId) -> Result<RoomMember> {
        self.join_room(room_id, target).await
    }

    pub async fn leave_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        let member = self.require_member(room_id, user_id).await?;
        if member.role == Role::Owner {
            return Err(Error::InvalidInput(
                "The owner cannot leave their own room".to_string(),
            ));
        }
        self.members.remove(room_id, user_id).await?;
        tracing::info!(room_id = %room_id, user_id = %user_id, "member left");
        Ok(())
    }

    pub async fn kick_member(&self, room_id: &RoomId, target: &UserId) -> Result<()> {
        let member = self.require_member(room_id, target).await?;
        if member.role == Role::Owner {
            return Err(Error::InvalidInput("The owner cannot be kicked".to_string()));
        }
        self.members.remove(room_id, target).await?;
        tracing::info!(room_id = %room_id, user_id = %target, "member kicked");
        Ok(())
    }

    pub async fn ban_member(
        &self,
        room_id: &RoomId,
        target: &UserId,
        banned_by: &UserId,
    ) -> Result<()> {
        let member = self.require_member(room_id, target).await?;
        if member.role == Role::Owner {
            return Err(Error::InvalidInput("The owner cannot be banned".to_string()));
        }
        self.members
            .set_banned(room_id, target, Some(banned_by), true)
            .await?;
        tracing::info!(room_id = %room_id, user_id = %target, by = %banned_by, "member banned");
        Ok(())
    }

    pub async fn unban_member(&self, room_id: &RoomId, target: &UserId) -> Result<()> {
        self.require_member(room_id, target).await?;
        self.members.set_banned(room_id, target, None, false).await?;
        tracing::info!(room_id = %room_id, user_id = %target, "member unbanned");
        Ok(())
    }

    pub async fn set_member_role(&self, room_id: &RoomId, target: &UserId, role: Role) -> Result<()> {
        let member = self.require_member(room_id, target).await?;
        if member.role == Role::Owner || role == Role::Owner {
            return Err(Error::InvalidInput(
                "Ownership is not transferable through role edits".to_string(),
            ));
        }
        self.members.set_role(room_id, target, role).await?;
        tracing::info!(room_id = %room_id, user_id = %target, role = %role, "member role changed");
        Ok(())
    }

    pub async fn set_member_permissions(
        &self,
        room_id: &RoomId,
        target: &UserId,
        granted: PermissionMask,
        denied: PermissionMask,
    ) -> Result<()> {
        self.require_member(room_id, target).await?;
        self.members
            .set_permissions(room_id, target, granted, denied)
            .await?;
        tracing::info!(room_id = %room_id, user_id = %target, "member permissions changed");
        Ok(())
    }

    pub async fn list_members(&self, room_id: &RoomId) -> Result<Vec<RoomMember>> {
        self.get_room(room_id).await?;
        self.members.list(room_id).await
    }

    async fn require_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<RoomMember> {
        self.members
            .get(room_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Not a member of room {room_id}")))
    }
}
