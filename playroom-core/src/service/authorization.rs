//! Policy resolution and requirement evaluation
//!
//! Authorization is expressed as policy names. A small closed set of
//! dynamic policies is resolved here into requirement lists; every other
//! name belongs to the host's static policy table and is forwarded to it
//! verbatim. Requirements are evaluated against the request's identity and
//! room membership, which may come from the request-scoped gate cache or
//! from a fresh lookup.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;

use crate::{
    models::{PermissionMask, Role, RoomId, RoomMember, UserId},
    Result,
};

/// Exact-match policy granting access to any non-banned room member.
pub const ROOM_MEMBER_POLICY: &str = "RoomMember";

/// Prefix for permission-gated policies, e.g. `RoomPermission:StartGame`.
pub const ROOM_PERMISSION_PREFIX: &str = "RoomPermission:";

/// Prefix for role-gated policies, e.g. `RoomRole:Owner`.
pub const ROOM_ROLE_PREFIX: &str = "RoomRole:";

/// Membership lookup collaborator.
///
/// A plain read: no row lock, no write-back. Must be safely callable
/// concurrently for distinct (user, room) pairs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn find_membership(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
    ) -> Result<Option<RoomMember>>;
}

/// A single authorization requirement.
///
/// `RoomPermission` and `RoomRole` imply `RoomMember`, which implies
/// `Authenticated`; resolved policies list the implied requirements
/// explicitly, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    RoomMember,
    RoomPermission(PermissionMask),
    RoomRole(Role),
}

/// Source of policies outside this resolver's jurisdiction.
///
/// Unrecognized names are not errors; they are forwarded here unchanged.
pub trait FallbackPolicyProvider: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Vec<Requirement>>;
}

/// Static name -> requirements table, the usual fallback provider.
#[derive(Debug, Default)]
pub struct StaticPolicyTable {
    policies: HashMap<String, Vec<Requirement>>,
}

impl StaticPolicyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(mut self, name: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        self.policies.insert(name.into(), requirements);
        self
    }
}

impl FallbackPolicyProvider for StaticPolicyTable {
    fn resolve(&self, name: &str) -> Option<Vec<Requirement>> {
        self.policies.get(name).cloned()
    }
}

/// Resolves policy names into requirement lists.
///
/// Grammar: the `RoomMember` literal, or a recognized prefix followed by a
/// case-insensitive enumeration name. Prefixed names with malformed
/// suffixes fall through to the fallback provider like any other
/// unrecognized name.
pub struct PolicyResolver {
    fallback: Box<dyn FallbackPolicyProvider>,
}

impl PolicyResolver {
    pub fn new(fallback: Box<dyn FallbackPolicyProvider>) -> Self {
        Self { fallback }
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Vec<Requirement>> {
        if name == ROOM_MEMBER_POLICY {
            return Some(vec![Requirement::Authenticated, Requirement::RoomMember]);
        }

        if let Some(suffix) = name.strip_prefix(ROOM_PERMISSION_PREFIX) {
            if let Some(flag) = PermissionMask::flag_from_name(suffix) {
                return Some(vec![
                    Requirement::Authenticated,
                    Requirement::RoomMember,
                    Requirement::RoomPermission(PermissionMask(flag)),
                ]);
            }
            return self.fallback.resolve(name);
        }

        if let Some(suffix) = name.strip_prefix(ROOM_ROLE_PREFIX) {
            if let Ok(role) = Role::from_str(suffix) {
                return Some(vec![
                    Requirement::Authenticated,
                    Requirement::RoomMember,
                    Requirement::RoomRole(role),
                ]);
            }
            return self.fallback.resolve(name);
        }

        self.fallback.resolve(name)
    }
}

/// Why a requirement evaluation denied access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No authenticated identity on the request
    Unauthenticated,
    /// A room-scoped requirement was evaluated without a resolvable room
    RoomUnresolved,
    /// No membership record for (user, room)
    NotMember,
    /// Membership exists but carries the ban marker
    Banned,
    /// Effective permissions do not cover the required mask
    MissingPermission(PermissionMask),
    /// Stored role differs from the required one
    RoleMismatch(Role),
}

/// Outcome of evaluating a requirement list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenyReason),
}

impl AccessDecision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Request-side inputs to requirement evaluation.
///
/// `membership` is the gate's request-scoped cache entry when the gate
/// ran; evaluation prefers it and only falls back to the lookup when it
/// is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementContext<'a> {
    pub user_id: Option<&'a UserId>,
    pub room_id: Option<&'a RoomId>,
    pub membership: Option<&'a RoomMember>,
}

/// Evaluate a requirement list against the request context.
///
/// At most one membership lookup is performed, and only when a
/// room-scoped requirement is present and the context carries no cached
/// membership. The ban check is applied identically on both the cached
/// and the freshly-loaded path.
pub async fn evaluate_requirements(
    requirements: &[Requirement],
    ctx: RequirementContext<'_>,
    lookup: &dyn MembershipLookup,
) -> Result<AccessDecision> {
    let mut loaded: Option<RoomMember> = None;

    for requirement in requirements {
        match requirement {
            Requirement::Authenticated => {
                if ctx.user_id.is_none() {
                    return Ok(AccessDecision::Denied(DenyReason::Unauthenticated));
                }
            }
            Requirement::RoomMember => {
                match resolve_membership(&ctx, &mut loaded, lookup).await? {
                    Ok(_) => {}
                    Err(reason) => return Ok(AccessDecision::Denied(reason)),
                }
            }
            Requirement::RoomPermission(required) => {
                match resolve_membership(&ctx, &mut loaded, lookup).await? {
                    Ok(member) => {
                        if !member.effective_permissions().includes(*required) {
                            return Ok(AccessDecision::Denied(DenyReason::MissingPermission(
                                *required,
                            )));
                        }
                    }
                    Err(reason) => return Ok(AccessDecision::Denied(reason)),
                }
            }
            Requirement::RoomRole(required) => {
                match resolve_membership(&ctx, &mut loaded, lookup).await? {
                    Ok(member) => {
                        if member.role != *required {
                            return Ok(AccessDecision::Denied(DenyReason::RoleMismatch(*required)));
                        }
                    }
                    Err(reason) => return Ok(AccessDecision::Denied(reason)),
                }
            }
        }
    }

    Ok(AccessDecision::Allowed)
}

/// Membership for the current evaluation: the context's cached copy, the
/// previously-loaded copy, or one fresh lookup. Absence and the ban
/// marker map to deny reasons here so every caller treats them the same.
async fn resolve_membership<'e>(
    ctx: &'e RequirementContext<'_>,
    loaded: &'e mut Option<RoomMember>,
    lookup: &dyn MembershipLookup,
) -> Result<std::result::Result<&'e RoomMember, DenyReason>> {
    if let Some(member) = ctx.membership {
        if member.is_banned() {
            return Ok(Err(DenyReason::Banned));
        }
        return Ok(Ok(member));
    }

    if loaded.is_none() {
        let Some(user_id) = ctx.user_id else {
            return Ok(Err(DenyReason::Unauthenticated));
        };
        let Some(room_id) = ctx.room_id else {
            return Ok(Err(DenyReason::RoomUnresolved));
        };

        match lookup.find_membership(user_id, room_id).await? {
            Some(member) => *loaded = Some(member),
            None => return Ok(Err(DenyReason::NotMember)),
        }
    }

    match loaded.as_ref() {
        Some(member) if member.is_banned() => Ok(Err(DenyReason::Banned)),
        Some(member) => Ok(Ok(member)),
        None => Ok(Err(DenyReason::NotMember)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PolicyResolver {
        PolicyResolver::new(Box::new(
            StaticPolicyTable::new()
                .with_policy("ApiUser", vec![Requirement::Authenticated]),
        ))
    }

    #[test]
    fn test_resolve_room_member_literal() {
        let resolved = resolver().resolve("RoomMember").expect("recognized");
        assert_eq!(
            resolved,
            vec![Requirement::Authenticated, Requirement::RoomMember]
        );
    }

    #[test]
    fn test_resolve_room_permission() {
        let resolved = resolver()
            .resolve("RoomPermission:StartGame")
            .expect("recognized");
        assert_eq!(
            resolved,
            vec![
                Requirement::Authenticated,
                Requirement::RoomMember,
                Requirement::RoomPermission(PermissionMask(PermissionMask::START_GAME)),
            ]
        );
    }

    #[test]
    fn test_resolve_suffix_is_case_insensitive() {
        let resolved = resolver().resolve("RoomRole:OWNER").expect("recognized");
        assert_eq!(
            resolved,
            vec![
                Requirement::Authenticated,
                Requirement::RoomMember,
                Requirement::RoomRole(Role::Owner),
            ]
        );
        assert!(resolver().resolve("RoomPermission:kickplayer").is_some());
    }

    #[test]
    fn test_unrecognized_name_goes_to_fallback() {
        let resolved = resolver().resolve("ApiUser").expect("fallback hit");
        assert_eq!(resolved, vec![Requirement::Authenticated]);
        assert!(resolver().resolve("SomeOtherPolicy").is_none());
    }

    #[test]
    fn test_malformed_suffix_goes_to_fallback() {
        // Prefix matches, suffix is not a flag name: out of our
        // jurisdiction, forwarded verbatim, not an error.
        let fallback = StaticPolicyTable::new()
            .with_policy("RoomPermission:Fly", vec![Requirement::Authenticated]);
        let resolver = PolicyResolver::new(Box::new(fallback));

        assert_eq!(
            resolver.resolve("RoomPermission:Fly"),
            Some(vec![Requirement::Authenticated])
        );
        assert!(resolver.resolve("RoomRole:Wizard").is_none());
    }

    mod evaluation {
        use super::*;

        fn member(role: Role) -> RoomMember {
            RoomMember::new(RoomId::new(), UserId::new(), role)
        }

        fn member_policy() -> Vec<Requirement> {
            vec![Requirement::Authenticated, Requirement::RoomMember]
        }

        fn permission_policy(flag: u64) -> Vec<Requirement> {
            vec![
                Requirement::Authenticated,
                Requirement::RoomMember,
                Requirement::RoomPermission(PermissionMask(flag)),
            ]
        }

        #[tokio::test]
        async fn test_anonymous_is_denied() {
            let mut lookup = MockMembershipLookup::new();
            lookup.expect_find_membership().times(0);

            let ctx = RequirementContext {
                user_id: None,
                room_id: None,
                membership: None,
            };
            let decision = evaluate_requirements(&member_policy(), ctx, &lookup)
                .await
                .expect("evaluation");
            assert_eq!(
                decision,
                AccessDecision::Denied(DenyReason::Unauthenticated)
            );
        }

        #[tokio::test]
        async fn test_non_member_is_denied() {
            let user = UserId::new();
            let room = RoomId::new();

            let mut lookup = MockMembershipLookup::new();
            lookup
                .expect_find_membership()
                .times(1)
                .returning(|_, _| Ok(None));

            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: None,
            };
            let decision = evaluate_requirements(&member_policy(), ctx, &lookup)
                .await
                .expect("evaluation");
            assert_eq!(decision, AccessDecision::Denied(DenyReason::NotMember));
        }

        #[tokio::test]
        async fn test_banned_member_is_denied_on_lookup_path() {
            let user = UserId::new();
            let room = RoomId::new();

            let mut lookup = MockMembershipLookup::new();
            lookup.expect_find_membership().times(1).returning(|u, r| {
                let mut m = RoomMember::new(r.clone(), u.clone(), Role::Owner);
                m.ban(UserId::new());
                Ok(Some(m))
            });

            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: None,
            };
            let decision = evaluate_requirements(&member_policy(), ctx, &lookup)
                .await
                .expect("evaluation");
            assert_eq!(decision, AccessDecision::Denied(DenyReason::Banned));
        }

        #[tokio::test]
        async fn test_banned_member_is_denied_on_cached_path() {
            // Same outcome whether membership came from the gate's cache
            // or from a fresh lookup.
            let user = UserId::new();
            let room = RoomId::new();
            let mut cached = member(Role::Owner);
            cached.ban(UserId::new());

            let mut lookup = MockMembershipLookup::new();
            lookup.expect_find_membership().times(0);

            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: Some(&cached),
            };
            let decision = evaluate_requirements(&member_policy(), ctx, &lookup)
                .await
                .expect("evaluation");
            assert_eq!(decision, AccessDecision::Denied(DenyReason::Banned));
        }

        #[tokio::test]
        async fn test_cached_membership_skips_lookup() {
            let user = UserId::new();
            let room = RoomId::new();
            let cached = member(Role::Moderator);

            let mut lookup = MockMembershipLookup::new();
            lookup.expect_find_membership().times(0);

            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: Some(&cached),
            };
            let decision =
                evaluate_requirements(&permission_policy(PermissionMask::KICK_PLAYER), ctx, &lookup)
                    .await
                    .expect("evaluation");
            assert_eq!(decision, AccessDecision::Allowed);
        }

        #[tokio::test]
        async fn test_missing_permission_is_denied() {
            let user = UserId::new();
            let room = RoomId::new();
            let cached = member(Role::Player);

            let lookup = MockMembershipLookup::new();
            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: Some(&cached),
            };
            let decision =
                evaluate_requirements(&permission_policy(PermissionMask::START_GAME), ctx, &lookup)
                    .await
                    .expect("evaluation");
            assert_eq!(
                decision,
                AccessDecision::Denied(DenyReason::MissingPermission(PermissionMask(
                    PermissionMask::START_GAME
                )))
            );
        }

        #[tokio::test]
        async fn test_denied_override_blocks_permission() {
            let user = UserId::new();
            let room = RoomId::new();
            let mut cached = member(Role::Moderator);
            cached.deny_permissions(PermissionMask::KICK_PLAYER);

            let lookup = MockMembershipLookup::new();
            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: Some(&cached),
            };
            let decision =
                evaluate_requirements(&permission_policy(PermissionMask::KICK_PLAYER), ctx, &lookup)
                    .await
                    .expect("evaluation");
            assert!(!decision.is_allowed());
        }

        #[tokio::test]
        async fn test_role_requirement() {
            let user = UserId::new();
            let room = RoomId::new();
            let cached = member(Role::Moderator);

            let lookup = MockMembershipLookup::new();
            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: Some(&cached),
            };

            let owner_only = vec![
                Requirement::Authenticated,
                Requirement::RoomMember,
                Requirement::RoomRole(Role::Owner),
            ];
            let decision = evaluate_requirements(&owner_only, ctx, &lookup)
                .await
                .expect("evaluation");
            assert_eq!(
                decision,
                AccessDecision::Denied(DenyReason::RoleMismatch(Role::Owner))
            );
        }

        #[tokio::test]
        async fn test_room_requirement_without_room_route() {
            let user = UserId::new();

            let lookup = MockMembershipLookup::new();
            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: None,
                membership: None,
            };
            let decision = evaluate_requirements(&member_policy(), ctx, &lookup)
                .await
                .expect("evaluation");
            assert_eq!(
                decision,
                AccessDecision::Denied(DenyReason::RoomUnresolved)
            );
        }

        #[tokio::test]
        async fn test_single_lookup_for_multiple_requirements() {
            let user = UserId::new();
            let room = RoomId::new();

            let mut lookup = MockMembershipLookup::new();
            lookup.expect_find_membership().times(1).returning(|u, r| {
                Ok(Some(RoomMember::new(r.clone(), u.clone(), Role::Owner)))
            });

            let ctx = RequirementContext {
                user_id: Some(&user),
                room_id: Some(&room),
                membership: None,
            };
            let requirements = vec![
                Requirement::Authenticated,
                Requirement::RoomMember,
                Requirement::RoomPermission(PermissionMask(PermissionMask::MANAGE_ROLES)),
                Requirement::RoomRole(Role::Owner),
            ];
            let decision = evaluate_requirements(&requirements, ctx, &lookup)
                .await
                .expect("evaluation");
            assert_eq!(decision, AccessDecision::Allowed);
        }
    }
}
