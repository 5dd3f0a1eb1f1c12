pub mod auth;
pub mod authorization;
pub mod room;

pub use auth::{Claims, JwtService};
pub use authorization::{
    AccessDecision, DenyReason, MembershipLookup, PolicyResolver, Requirement,
    RequirementContext, StaticPolicyTable,
};
pub use room::RoomService;
