use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use crate::api::handlers::{AppState, auth, friends, games, lives, profile, search, statistics};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", common_routes())
        .nest("/api/v2", common_routes().merge(v2_routes()))
        .with_state(state)
}

/// Endpoints served identically by both API versions.
fn common_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verifycode", post(auth::verify_code))
        .route("/profile", get(profile::show).put(profile::update))
        .route("/profile/language", put(profile::set_language))
        .route("/profile/verifyemail", post(profile::verify_email))
        .route(
            "/profile/pushtoken",
            post(profile::register_push_token).put(profile::remove_push_token),
        )
        .route("/friends", get(friends::list).post(friends::accept))
        .route("/friends/:friendID", delete(friends::remove))
        .route(
            "/friends/request",
            get(friends::list_requests).post(friends::create_request),
        )
        .route(
            "/friends/request/:friendRequestID",
            delete(friends::decline_request),
        )
        .route("/games", get(games::list).post(games::create))
        .route("/games/history", post(games::history))
        .route("/games/:gameID/start", post(games::start))
        .route("/games/:gameID/result", post(games::result))
        .route("/search", post(search::users))
        .route("/statistics/toplist", get(statistics::toplist))
        .route("/statistics/rank", get(statistics::rank))
}

/// Endpoints that only exist under /api/v2.
fn v2_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/createUser", post(auth::create_guest))
        .route("/auth/updateUser", post(profile::update_user))
        .route("/lifeRequest", get(lives::show).post(lives::create))
        .route("/giveLife", post(lives::give))
}
