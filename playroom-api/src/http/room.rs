// Room and membership HTTP handlers

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use playroom_core::models::{
    PermissionMask, Role, Room, RoomId, RoomMember, RoomSettings, UserId,
};

use super::conditional::{
    check_if_match, check_if_none_match, IfMatchOutcome, IfNoneMatchOutcome,
};
use super::middleware::{AuthUser, CurrentMembership};
use super::validation::validate_room_name;
use super::{AppError, AppResult, AppState};

/// Create room request
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub max_players: Option<i32>,
    pub is_private: Option<bool>,
    pub allow_spectators: Option<bool>,
}

/// Room settings update request. A full replacement; the `If-Match`
/// header carries the token the client last read.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub max_players: Option<i32>,
    pub is_private: Option<bool>,
    pub allow_spectators: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    /// Flag names granted on top of the role's base mask
    pub granted: Vec<String>,
    /// Flag names denied; denial wins over any grant
    pub denied: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub user_id: String,
}

/// Room response
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub settings: RoomSettings,
    pub created_at: String,
    pub updated_at: String,
}

impl RoomResponse {
    fn from_room(room: &Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            name: room.name.clone(),
            created_by: room.created_by.as_str().to_string(),
            settings: room.settings.clone(),
            created_at: room.created_at.to_rfc3339(),
            updated_at: room.updated_at.to_rfc3339(),
        }
    }
}

/// Member response
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub role: String,
    pub permissions: u64,
    pub banned: bool,
    pub joined_at: String,
}

impl MemberResponse {
    fn from_member(member: &RoomMember) -> Self {
        Self {
            user_id: member.user_id.as_str().to_string(),
            role: member.role.to_string(),
            permissions: member.effective_permissions().bits(),
            banned: member.banned,
            joined_at: member.joined_at.to_rfc3339(),
        }
    }
}

fn settings_from(
    max_players: Option<i32>,
    is_private: Option<bool>,
    allow_spectators: Option<bool>,
) -> RoomSettings {
    let defaults = RoomSettings::default();
    RoomSettings {
        max_players: max_players.or(defaults.max_players),
        is_private: is_private.unwrap_or(defaults.is_private),
        allow_spectators: allow_spectators.unwrap_or(defaults.allow_spectators),
    }
}

fn path_room_id(raw: &str) -> AppResult<RoomId> {
    RoomId::parse(raw)
        .ok_or_else(|| AppError::bad_request("room_id_missing", "No usable room identifier in route"))
}

fn path_user_id(raw: &str) -> AppResult<UserId> {
    UserId::parse(raw)
        .ok_or_else(|| AppError::bad_request("invalid_input", "Invalid user identifier in route"))
}

fn conditional_header<'h>(headers: &'h HeaderMap, name: header::HeaderName) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Create a new room; the caller becomes its owner.
pub async fn create_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> AppResult<Response> {
    validate_room_name(&req.name)?;
    let settings = settings_from(req.max_players, req.is_private, req.allow_spectators);

    let (room, _owner) = state
        .room_service
        .create_room(req.name.trim().to_string(), auth.user_id, settings)
        .await?;

    Ok((
        StatusCode::CREATED,
        [(header::ETAG, room.etag())],
        Json(RoomResponse::from_room(&room)),
    )
        .into_response())
}

/// Get room information.
///
/// Honors `If-None-Match`: a current client copy gets 304 with the
/// `ETag` re-emitted and no body.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let room_id = path_room_id(&room_id)?;
    let room = state.room_service.get_room(&room_id).await?;

    match check_if_none_match(
        conditional_header(&headers, header::IF_NONE_MATCH),
        room.version,
    ) {
        IfNoneMatchOutcome::NotModified => {
            Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, room.etag())]).into_response())
        }
        IfNoneMatchOutcome::Invalid => Err(AppError::bad_request(
            "etag_invalid",
            "If-None-Match carries no usable validator",
        )),
        IfNoneMatchOutcome::Proceed => Ok((
            [(header::ETAG, room.etag())],
            Json(RoomResponse::from_room(&room)),
        )
            .into_response()),
    }
}

/// Update room settings.
///
/// `If-Match` is mandatory: absent → 428, unusable or stale → 412. The
/// storage-level version check still guards the write, so a race between
/// the header check and the update surfaces as 409.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateSettingsRequest>,
) -> AppResult<Response> {
    let room_id = path_room_id(&room_id)?;
    let room = state.room_service.get_room(&room_id).await?;

    let expected = match check_if_match(
        conditional_header(&headers, header::IF_MATCH),
        room.version,
    ) {
        IfMatchOutcome::Missing => {
            return Err(AppError::precondition_required(
                "etag_required",
                "If-Match header is required for updates",
            ));
        }
        IfMatchOutcome::Invalid => {
            return Err(AppError::precondition_failed(
                "etag_invalid",
                "If-Match carries no usable validator",
            ));
        }
        IfMatchOutcome::Mismatch => {
            return Err(AppError::precondition_failed(
                "etag_mismatch",
                "Room has changed since it was last read",
            ));
        }
        // A match pins the update to the version the client saw; the
        // wildcard means "whatever is current".
        IfMatchOutcome::Matched | IfMatchOutcome::Wildcard => room.version,
    };

    let settings = settings_from(req.max_players, req.is_private, req.allow_spectators);
    let updated = state
        .room_service
        .update_settings(&room_id, settings, expected)
        .await?;

    Ok((
        [(header::ETAG, updated.etag())],
        Json(RoomResponse::from_room(&updated)),
    )
        .into_response())
}

/// Delete a room (owner only, enforced by the route's policy)
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<StatusCode> {
    let room_id = path_room_id(&room_id)?;
    state.room_service.delete_room(&room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join a room as a player
pub async fn join_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<MemberResponse>> {
    let room_id = path_room_id(&room_id)?;
    let member = state.room_service.join_room(&room_id, &auth.user_id).await?;
    Ok(Json(MemberResponse::from_member(&member)))
}

/// Leave a room
pub async fn leave_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<StatusCode> {
    let room_id = path_room_id(&room_id)?;
    state.room_service.leave_room(&room_id, &auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own membership, from the gate's request-scoped entry
/// (no second lookup on gated routes).
pub async fn my_membership(membership: CurrentMembership) -> Json<MemberResponse> {
    Json(MemberResponse::from_member(&membership.0))
}

/// List active members
pub async fn list_members(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Vec<MemberResponse>>> {
    let room_id = path_room_id(&room_id)?;
    let members = state.room_service.list_members(&room_id).await?;
    Ok(Json(members.iter().map(MemberResponse::from_member).collect()))
}

/// Invite a user: creates a player membership for them
pub async fn invite_member(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<InviteRequest>,
) -> AppResult<Json<MemberResponse>> {
    let room_id = path_room_id(&room_id)?;
    let target = UserId::parse(&req.user_id)
        .ok_or_else(|| AppError::bad_request("invalid_input", "Invalid user identifier"))?;
    let member = state.room_service.invite_member(&room_id, &target).await?;
    Ok(Json(MemberResponse::from_member(&member)))
}

/// Kick a member out of the room
pub async fn kick_member(
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let room_id = path_room_id(&room_id)?;
    let target = path_user_id(&user_id)?;
    state.room_service.kick_member(&room_id, &target).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Ban a member; the record stays so the ban is enforceable
pub async fn ban_member(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let room_id = path_room_id(&room_id)?;
    let target = path_user_id(&user_id)?;
    state
        .room_service
        .ban_member(&room_id, &target, &auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lift a ban
pub async fn unban_member(
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let room_id = path_room_id(&room_id)?;
    let target = path_user_id(&user_id)?;
    state.room_service.unban_member(&room_id, &target).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change a member's role
pub async fn set_member_role(
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
    Json(req): Json<SetRoleRequest>,
) -> AppResult<StatusCode> {
    let room_id = path_room_id(&room_id)?;
    let target = path_user_id(&user_id)?;
    let role = Role::from_str(&req.role)
        .map_err(|e| AppError::bad_request("invalid_input", e))?;
    state
        .room_service
        .set_member_role(&room_id, &target, role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace a member's permission overrides
pub async fn set_member_permissions(
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
    Json(req): Json<SetPermissionsRequest>,
) -> AppResult<StatusCode> {
    let room_id = path_room_id(&room_id)?;
    let target = path_user_id(&user_id)?;
    let granted = mask_from_names(&req.granted)?;
    let denied = mask_from_names(&req.denied)?;
    state
        .room_service
        .set_member_permissions(&room_id, &target, granted, denied)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn mask_from_names(names: &[String]) -> AppResult<PermissionMask> {
    let mut mask = PermissionMask::empty();
    for name in names {
        let flag = PermissionMask::flag_from_name(name).ok_or_else(|| {
            AppError::bad_request("invalid_input", format!("Unknown permission flag: {name}"))
        })?;
        mask.grant(flag);
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_fills_defaults() {
        let settings = settings_from(None, None, None);
        assert_eq!(settings, RoomSettings::default());

        let settings = settings_from(Some(2), Some(true), None);
        assert_eq!(settings.max_players, Some(2));
        assert!(settings.is_private);
        assert!(settings.allow_spectators);
    }

    #[test]
    fn test_mask_from_names() {
        let mask = mask_from_names(&["StartGame".to_string(), "invite".to_string()])
            .expect("known flags");
        assert_eq!(
            mask.bits(),
            PermissionMask::START_GAME | PermissionMask::INVITE
        );

        assert!(mask_from_names(&["Fly".to_string()]).is_err());
        assert_eq!(mask_from_names(&[]).expect("empty").bits(), PermissionMask::NONE);
    }

    #[test]
    fn test_member_response_reports_effective_permissions() {
        let mut member = RoomMember::new(RoomId::new(), UserId::new(), Role::Player);
        member.grant_permissions(PermissionMask::INVITE);
        member.deny_permissions(PermissionMask::TAG);

        let response = MemberResponse::from_member(&member);
        assert_eq!(response.role, "player");
        assert_eq!(response.permissions, PermissionMask::INVITE);
        assert!(!response.banned);
    }
}
