use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{RoomId, UserId};
use super::version::ConcurrencyToken;

/// Room settings, stored as a JSONB blob alongside the room row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    pub max_players: Option<i32>,
    pub is_private: bool,
    pub allow_spectators: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: Some(8),
            is_private: false,
            allow_spectators: true,
        }
    }
}

/// Room aggregate. The version counter is bumped by the repository on
/// every successful update and doubles as the HTTP concurrency token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub created_by: UserId,
    pub settings: RoomSettings,
    pub version: ConcurrencyToken,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new(name: String, created_by: UserId, settings: RoomSettings) -> Self {
        let now = Utc::now();
        Self {
            id: RoomId::new(),
            name,
            created_by,
            settings,
            version: ConcurrencyToken::new(0),
            created_at: now,
            updated_at: now,
        }
    }

    /// Strong validator for the `ETag` response header.
    #[must_use]
    pub fn etag(&self) -> String {
        self.version.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_starts_at_version_zero() {
        let room = Room::new("lobby".to_string(), UserId::new(), RoomSettings::default());
        assert_eq!(room.version, ConcurrencyToken::new(0));
        assert_eq!(room.etag(), ConcurrencyToken::new(0).encode());
    }
}
