pub mod room;
pub mod room_member;

pub use room::RoomRepository;
pub use room_member::RoomMemberRepository;
