//! Room permission system
//!
//! Permission bitmask over a closed flag set, with role presets and the
//! Allow/Deny override pattern: effective = (role base | granted) & ~denied.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Permission bitmask (u64)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMask(pub u64);

impl PermissionMask {
    /// Start a game in the room
    pub const START_GAME: u64 = 1 << 0;

    /// Edit room settings
    pub const EDIT_SETTINGS: u64 = 1 << 1;

    /// Invite users into the room
    pub const INVITE: u64 = 1 << 2;

    /// Kick a player out of the room
    pub const KICK_PLAYER: u64 = 1 << 3;

    /// Tag other players
    pub const TAG: u64 = 1 << 4;

    /// Manage member roles and permission overrides
    pub const MANAGE_ROLES: u64 = 1 << 5;

    /// All permissions (room owner)
    pub const ALL: u64 = Self::START_GAME
        | Self::EDIT_SETTINGS
        | Self::INVITE
        | Self::KICK_PLAYER
        | Self::TAG
        | Self::MANAGE_ROLES;

    pub const NONE: u64 = 0;

    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self(Self::NONE)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True iff every bit of `required` is set.
    ///
    /// The empty mask includes the empty mask (vacuous truth).
    #[must_use]
    pub const fn includes(self, required: Self) -> bool {
        (self.0 & required.0) == required.0
    }

    /// True iff the intersection with `flags` is non-empty.
    ///
    /// NOT the complement of `includes`: the empty mask includes-any of
    /// nothing, the empty mask included.
    #[must_use]
    pub const fn includes_any(self, flags: Self) -> bool {
        (self.0 & flags.0) != 0
    }

    /// Add permission bits (Allow pattern)
    pub const fn grant(&mut self, permission: u64) {
        self.0 |= permission;
    }

    /// Remove permission bits (Deny pattern)
    pub const fn revoke(&mut self, permission: u64) {
        self.0 &= !permission;
    }

    /// Union of two masks
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bits of `self` not present in `other`
    #[must_use]
    pub const fn subtract(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Look up a single flag by its enumeration name, case-insensitively.
    /// Unknown names yield `None`.
    #[must_use]
    pub fn flag_from_name(name: &str) -> Option<u64> {
        match name.to_ascii_lowercase().as_str() {
            "startgame" => Some(Self::START_GAME),
            "editsettings" => Some(Self::EDIT_SETTINGS),
            "invite" => Some(Self::INVITE),
            "kickplayer" => Some(Self::KICK_PLAYER),
            "tag" => Some(Self::TAG),
            "manageroles" => Some(Self::MANAGE_ROLES),
            _ => None,
        }
    }
}

impl Default for PermissionMask {
    fn default() -> Self {
        Self::empty()
    }
}

// Database mapping: PermissionMask <-> BIGINT. All defined flags fit in the
// low 6 bits, so the sign bit never carries information.
impl sqlx::Type<sqlx::Postgres> for PermissionMask {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for PermissionMask {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let val = self.0 as i64;
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&val, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PermissionMask {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let val = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(val as u64))
    }
}

/// Room role preset
///
/// Room-level roles that determine base permissions. Per-member overrides
/// are layered on via the Allow/Deny pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Room owner - has all permissions
    Owner,
    /// Moderator - everything except role management
    Moderator,
    /// Regular player
    Player,
}

impl Role {
    /// Base permissions for this role, before Allow/Deny overrides.
    /// Total over the closed role set.
    #[must_use]
    pub const fn permissions(self) -> PermissionMask {
        match self {
            Self::Owner => PermissionMask(PermissionMask::ALL),
            Self::Moderator => PermissionMask(PermissionMask::ALL & !PermissionMask::MANAGE_ROLES),
            Self::Player => PermissionMask(PermissionMask::TAG),
        }
    }

    /// Effective permissions with Allow/Deny overrides applied:
    /// (base | granted) & ~denied. Denial is applied last and wins over
    /// both the base grant and an explicit grant of the same flag.
    #[must_use]
    pub const fn effective(self, granted: PermissionMask, denied: PermissionMask) -> PermissionMask {
        PermissionMask((self.permissions().0 | granted.0) & !denied.0)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "moderator" => Ok(Self::Moderator),
            "player" => Ok(Self::Player),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Moderator => write!(f, "moderator"),
            Self::Player => write!(f, "player"),
        }
    }
}

// Database mapping: Role -> SMALLINT (1=owner, 2=moderator, 3=player)
impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i16 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for Role {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let val: i16 = match self {
            Self::Owner => 1,
            Self::Moderator => 2,
            Self::Player => 3,
        };
        <i16 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&val, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let val = <i16 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match val {
            1 => Ok(Self::Owner),
            2 => Ok(Self::Moderator),
            3 => Ok(Self::Player),
            _ => Err(format!("Invalid Role value: {val}").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes() {
        let mask = PermissionMask(PermissionMask::START_GAME | PermissionMask::TAG);
        assert!(mask.includes(PermissionMask(PermissionMask::START_GAME)));
        assert!(mask.includes(PermissionMask(PermissionMask::START_GAME | PermissionMask::TAG)));
        assert!(!mask.includes(PermissionMask(PermissionMask::START_GAME | PermissionMask::INVITE)));
    }

    #[test]
    fn test_empty_mask_includes_empty() {
        // Vacuous truth: no required bit is missing.
        assert!(PermissionMask::empty().includes(PermissionMask::empty()));
    }

    #[test]
    fn test_empty_mask_includes_any_empty_is_false() {
        // Empty intersection of zero with zero has no bits in common.
        assert!(!PermissionMask::empty().includes_any(PermissionMask::empty()));
    }

    #[test]
    fn test_includes_any() {
        let mask = PermissionMask(PermissionMask::INVITE);
        assert!(mask.includes_any(PermissionMask(PermissionMask::INVITE | PermissionMask::TAG)));
        assert!(!mask.includes_any(PermissionMask(PermissionMask::TAG)));
        assert!(!mask.includes_any(PermissionMask::empty()));
    }

    #[test]
    fn test_grant_revoke() {
        let mut mask = PermissionMask::empty();
        mask.grant(PermissionMask::INVITE);
        mask.grant(PermissionMask::TAG);
        assert!(mask.includes(PermissionMask(PermissionMask::INVITE)));

        mask.revoke(PermissionMask::INVITE);
        assert!(!mask.includes_any(PermissionMask(PermissionMask::INVITE)));
        assert!(mask.includes(PermissionMask(PermissionMask::TAG)));
    }

    #[test]
    fn test_role_base_permissions() {
        assert_eq!(Role::Owner.permissions().bits(), PermissionMask::ALL);

        let moderator = Role::Moderator.permissions();
        assert!(moderator.includes(PermissionMask(PermissionMask::KICK_PLAYER)));
        assert!(!moderator.includes_any(PermissionMask(PermissionMask::MANAGE_ROLES)));

        assert_eq!(Role::Player.permissions().bits(), PermissionMask::TAG);
    }

    #[test]
    fn test_effective_grant_on_player() {
        let effective = Role::Player.effective(
            PermissionMask(PermissionMask::INVITE),
            PermissionMask::empty(),
        );
        assert!(effective.includes(PermissionMask(PermissionMask::INVITE)));
        assert!(effective.includes(PermissionMask(PermissionMask::TAG)));
        assert!(!effective.includes_any(PermissionMask(PermissionMask::START_GAME)));
    }

    #[test]
    fn test_effective_denial_wins() {
        // Tag is base-granted then denied; net result is exactly Invite.
        let effective = Role::Player.effective(
            PermissionMask(PermissionMask::INVITE),
            PermissionMask(PermissionMask::TAG),
        );
        assert_eq!(effective.bits(), PermissionMask::INVITE);
    }

    #[test]
    fn test_effective_denial_wins_over_explicit_grant() {
        let effective = Role::Player.effective(
            PermissionMask(PermissionMask::INVITE),
            PermissionMask(PermissionMask::INVITE),
        );
        assert!(!effective.includes_any(PermissionMask(PermissionMask::INVITE)));
    }

    #[test]
    fn test_effective_moderator_denials() {
        let effective = Role::Moderator.effective(
            PermissionMask::empty(),
            PermissionMask(PermissionMask::EDIT_SETTINGS | PermissionMask::KICK_PLAYER),
        );
        assert!(effective.includes(PermissionMask(
            PermissionMask::START_GAME | PermissionMask::INVITE | PermissionMask::TAG
        )));
        assert!(!effective.includes_any(PermissionMask(
            PermissionMask::EDIT_SETTINGS
                | PermissionMask::KICK_PLAYER
                | PermissionMask::MANAGE_ROLES
        )));
    }

    #[test]
    fn test_flag_from_name_case_insensitive() {
        assert_eq!(
            PermissionMask::flag_from_name("StartGame"),
            Some(PermissionMask::START_GAME)
        );
        assert_eq!(
            PermissionMask::flag_from_name("MANAGEROLES"),
            Some(PermissionMask::MANAGE_ROLES)
        );
        assert_eq!(PermissionMask::flag_from_name("tag"), Some(PermissionMask::TAG));
        assert_eq!(PermissionMask::flag_from_name("Teleport"), None);
        assert_eq!(PermissionMask::flag_from_name(""), None);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("owner"), Ok(Role::Owner));
        assert_eq!(Role::from_str("MODERATOR"), Ok(Role::Moderator));
        assert_eq!(Role::from_str("Player"), Ok(Role::Player));
        assert!(Role::from_str("admin").is_err());
    }
}
