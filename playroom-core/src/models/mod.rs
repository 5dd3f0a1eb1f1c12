pub mod id;
pub mod permission;
pub mod room;
pub mod room_member;
pub mod version;

pub use id::{RoomId, UserId};
pub use permission::{PermissionMask, Role};
pub use room::{Room, RoomSettings};
pub use room_member::RoomMember;
pub use version::ConcurrencyToken;
