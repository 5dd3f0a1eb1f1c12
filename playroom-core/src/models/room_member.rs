use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{RoomId, UserId};
use super::permission::{PermissionMask, Role};

/// Membership record binding one user to one room.
///
/// Created when a user first joins; mutated only by explicit role,
/// permission, and ban administration. Banning is a soft delete: the row
/// survives so the ban can be enforced and later lifted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    pub room_id: RoomId,
    pub user_id: UserId,

    /// Room role (base permission level)
    pub role: Role,

    /// Allow/Deny overrides layered on the role's base mask:
    /// effective = (base | granted) & ~denied
    pub granted_permissions: PermissionMask,
    pub denied_permissions: PermissionMask,

    pub banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub banned_by: Option<UserId>,

    pub joined_at: DateTime<Utc>,

    /// Bumped by the repository on every successful update
    pub version: i64,
}

impl RoomMember {
    pub fn new(room_id: RoomId, user_id: UserId, role: Role) -> Self {
        Self {
            room_id,
            user_id,
            role,
            granted_permissions: PermissionMask::empty(),
            denied_permissions: PermissionMask::empty(),
            banned: false,
            banned_at: None,
            banned_by: None,
            joined_at: Utc::now(),
            version: 0,
        }
    }

    #[must_use]
    pub const fn is_banned(&self) -> bool {
        self.banned
    }

    /// Effective permissions with this member's Allow/Deny overrides
    /// applied. Denial is applied last and always wins.
    #[must_use]
    pub const fn effective_permissions(&self) -> PermissionMask {
        self.role
            .effective(self.granted_permissions, self.denied_permissions)
    }

    /// Check a permission mask against the effective permissions.
    /// Banned members hold no permissions at all.
    #[must_use]
    pub fn has_permission(&self, required: PermissionMask) -> bool {
        if self.banned {
            return false;
        }
        self.effective_permissions().includes(required)
    }

    pub fn ban(&mut self, banned_by: UserId) {
        self.banned = true;
        self.banned_at = Some(Utc::now());
        self.banned_by = Some(banned_by);
    }

    pub fn unban(&mut self) {
        self.banned = false;
        self.banned_at = None;
        self.banned_by = None;
    }

    /// Add permission bits to the Allow override
    pub fn grant_permissions(&mut self, permissions: u64) {
        self.granted_permissions.grant(permissions);
    }

    /// Add permission bits to the Deny override
    pub fn deny_permissions(&mut self, permissions: u64) {
        self.denied_permissions.grant(permissions);
    }

    /// Clear both overrides, reverting to the role's base mask
    pub fn reset_to_role_default(&mut self) {
        self.granted_permissions = PermissionMask::empty();
        self.denied_permissions = PermissionMask::empty();
    }
}
