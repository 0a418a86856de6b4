use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rusqlite::Connection;

use crate::api::extract::{ApiJson, CurrentUser};
use crate::api::models::{
    FriendAccept, FriendRequestCreate, FriendRequestsResponse, OpenFriendRequestItem,
    PendingFriendRequestItem, UserResponse,
};
use crate::database::{friends, games, get_connection, users};
use crate::errors::GameError;
use crate::notify::NotificationKind;

use super::AppState;

/// GET /friends
pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    Ok(Json(friend_profiles(&conn, user.id)?))
}

/// POST /friends: the receiver accepts a friend request.
pub async fn accept(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<FriendAccept>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let request_id = body.friend_request_id.resolve()?;

    let Some(request) = friends::find_request_by_id(&conn, request_id)? else {
        return Err(GameError::FriendRequestNotFound);
    };
    if request.receiver_refer != user.id {
        return Err(GameError::FriendRequestNotReceiver);
    }
    if friends::are_friends(&conn, request.requester_refer, user.id)? {
        return Err(GameError::AlreadyFriends);
    }

    friends::insert_friendship(&conn, request.requester_refer, user.id)?;
    friends::delete_request(&conn, request.id)?;
    // A crossed request in the other direction is consumed by the acceptance.
    friends::delete_request_between(&conn, user.id, request.requester_refer)?;

    state.notifier.notify(
        NotificationKind::FriendRequestAccepted,
        request.requester_refer,
        Some(user.username.clone()),
    );

    let friends = friend_profiles(&conn, user.id)?;
    Ok((StatusCode::CREATED, Json(friends)))
}

/// DELETE /friends/:friendID
///
/// Removes the friendship and any game between the pair that never finished,
/// so neither inbox keeps a challenge from someone no longer a friend.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(friend_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let friend_id: i64 = friend_id
        .trim()
        .parse()
        .map_err(|_| GameError::Validation("invalid_user_id"))?;

    friends::delete_friendship(&conn, user.id, friend_id)?;
    games::delete_uncompleted_between(&conn, user.id, friend_id)?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /friends/request
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<FriendRequestCreate>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let receiver_id = body.friend_id.resolve()?;

    let Some(receiver) = users::find_by_id(&conn, receiver_id)? else {
        return Err(GameError::ReceiverNotFound);
    };
    if friends::are_friends(&conn, user.id, receiver.id)? {
        return Err(GameError::AlreadyFriends);
    }
    if receiver.id == user.id {
        return Err(GameError::CanNotFriendYourself);
    }
    if friends::request_exists(&conn, user.id, receiver.id)? {
        return Err(GameError::FriendRequestPending);
    }

    let request = friends::insert_friend_request(&conn, user.id, receiver.id)?;

    state.notifier.notify(
        NotificationKind::FriendRequestReceived,
        receiver.id,
        Some(user.username.clone()),
    );

    let item = PendingFriendRequestItem {
        id: request.id,
        receiver: UserResponse::public(&receiver),
    };
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /friends/request: requests awaiting the caller plus the caller's own
/// unanswered ones.
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;

    let mut open = Vec::new();
    for request in friends::list_requests_received(&conn, user.id)? {
        if let Some(requester) = users::find_by_id(&conn, request.requester_refer)? {
            open.push(OpenFriendRequestItem {
                id: request.id,
                requester: UserResponse::public(&requester),
            });
        }
    }

    let mut pending = Vec::new();
    for request in friends::list_requests_sent(&conn, user.id)? {
        if let Some(receiver) = users::find_by_id(&conn, request.receiver_refer)? {
            pending.push(PendingFriendRequestItem {
                id: request.id,
                receiver: UserResponse::public(&receiver),
            });
        }
    }

    Ok(Json(FriendRequestsResponse { open, pending }))
}

/// DELETE /friends/request/:friendRequestID: the receiver declines.
pub async fn decline_request(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let request_id: i64 = request_id
        .trim()
        .parse()
        .map_err(|_| GameError::Validation("invalid_user_id"))?;

    let Some(request) = friends::find_request_by_id(&conn, request_id)? else {
        return Err(GameError::FriendRequestNotFound);
    };
    if request.receiver_refer != user.id {
        return Err(GameError::FriendRequestNotReceiver);
    }
    friends::delete_request(&conn, request.id)?;

    Ok(StatusCode::NO_CONTENT)
}

fn friend_profiles(conn: &Connection, user_id: i64) -> Result<Vec<UserResponse>, GameError> {
    let mut profiles = Vec::new();
    let mut seen = Vec::new();
    for friend_id in friends::list_friend_ids(conn, user_id)? {
        if seen.contains(&friend_id) {
            continue;
        }
        seen.push(friend_id);
        if let Some(friend) = users::find_by_id(conn, friend_id)? {
            profiles.push(UserResponse::public(&friend));
        }
    }
    Ok(profiles)
}
