// Module: http
// HTTP/JSON REST API surface

pub mod conditional;
pub mod error;
pub mod middleware;
pub mod room;
pub mod validation;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use playroom_core::service::authorization::MembershipLookup;
use playroom_core::service::{JwtService, PolicyResolver, RoomService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
    pub member_lookup: Arc<dyn MembershipLookup>,
    pub jwt_service: JwtService,
    pub policies: Arc<PolicyResolver>,
}

/// Create the HTTP router with all routes
pub fn create_router(
    room_service: Arc<RoomService>,
    member_lookup: Arc<dyn MembershipLookup>,
    jwt_service: JwtService,
    policies: Arc<PolicyResolver>,
) -> Router {
    let state = AppState {
        room_service,
        member_lookup,
        jwt_service,
        policies,
    };

    // Room creation and joining happen before a membership exists, so
    // only authentication applies (in the handlers themselves).
    let open = Router::new()
        .route("/rooms", post(room::create_room))
        .route("/rooms/{room_id}/join", post(room::join_room));

    // Membership-gated routes: the gate resolves room and user, loads
    // the membership once, and caches it for the handlers.
    let gated = Router::new()
        .route("/rooms/{room_id}", get(room::get_room))
        .route("/rooms/{room_id}/members", get(room::list_members))
        .route("/rooms/{room_id}/me", get(room::my_membership))
        .route("/rooms/{room_id}/leave", post(room::leave_room))
        .route_layer(from_fn_with_state(state.clone(), middleware::membership_gate));

    // Policy-guarded routes. The gate runs outermost, then the policy
    // check evaluates against the gate's cached membership.
    let guarded = Router::new()
        .route(
            "/rooms/{room_id}/settings",
            put(room::update_settings).route_layer(from_fn_with_state(
                (state.clone(), "RoomPermission:EditSettings"),
                middleware::policy_middleware,
            )),
        )
        .route(
            "/rooms/{room_id}",
            delete(room::delete_room).route_layer(from_fn_with_state(
                (state.clone(), "RoomRole:Owner"),
                middleware::policy_middleware,
            )),
        )
        .route(
            "/rooms/{room_id}/invite",
            post(room::invite_member).route_layer(from_fn_with_state(
                (state.clone(), "RoomPermission:Invite"),
                middleware::policy_middleware,
            )),
        )
        .route(
            "/rooms/{room_id}/members/{user_id}",
            delete(room::kick_member).route_layer(from_fn_with_state(
                (state.clone(), "RoomPermission:KickPlayer"),
                middleware::policy_middleware,
            )),
        )
        .route(
            "/rooms/{room_id}/members/{user_id}/ban",
            post(room::ban_member).route_layer(from_fn_with_state(
                (state.clone(), "RoomPermission:KickPlayer"),
                middleware::policy_middleware,
            )),
        )
        .route(
            "/rooms/{room_id}/members/{user_id}/unban",
            post(room::unban_member).route_layer(from_fn_with_state(
                (state.clone(), "RoomPermission:KickPlayer"),
                middleware::policy_middleware,
            )),
        )
        .route(
            "/rooms/{room_id}/members/{user_id}/role",
            put(room::set_member_role).route_layer(from_fn_with_state(
                (state.clone(), "RoomPermission:ManageRoles"),
                middleware::policy_middleware,
            )),
        )
        .route(
            "/rooms/{room_id}/members/{user_id}/permissions",
            put(room::set_member_permissions).route_layer(from_fn_with_state(
                (state.clone(), "RoomPermission:ManageRoles"),
                middleware::policy_middleware,
            )),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::membership_gate));

    Router::new()
        .route("/health", get(health))
        .merge(open)
        .merge(gated)
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
