use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::api::extract::{ApiJson, CurrentUser};
use crate::api::models::{GiveLifeRequest, LifeRequestCreate, LifeRequestsResponse, UserResponse};
use crate::database::{get_connection, lives, users};
use crate::errors::GameError;
use crate::notify::NotificationKind;

use super::AppState;

/// POST /lifeRequest: ask several friends for a life at once. Receivers
/// that are unknown, the caller themselves, or already being asked are
/// skipped instead of failing the batch.
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<LifeRequestCreate>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;

    for receiver_id in body.receiver_refers {
        if receiver_id == user.id {
            continue;
        }
        if users::find_by_id(&conn, receiver_id)?.is_none() {
            log::debug!("life request to unknown user {receiver_id} skipped");
            continue;
        }
        if lives::pending_exists(&conn, user.id, receiver_id)? {
            continue;
        }

        lives::insert_life_request(&conn, user.id, receiver_id)?;
        state.notifier.notify(
            NotificationKind::LifeRequestReceived,
            receiver_id,
            Some(user.username.clone()),
        );
    }

    Ok((StatusCode::OK, Json(json!({}))))
}

/// GET /lifeRequest
///
/// Incoming asks plus the lives granted to the caller since the last poll.
/// Granted ones are marked collected on the way out, so each life is handed
/// over exactly once.
pub async fn show(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;

    let mut incoming_requests = Vec::new();
    for requester_id in lives::incoming_requester_ids(&conn, user.id)? {
        if let Some(requester) = users::find_by_id(&conn, requester_id)? {
            incoming_requests.push(UserResponse::public(&requester));
        }
    }

    let mut approved_requests = Vec::new();
    for request in lives::approved_uncollected(&conn, user.id)? {
        lives::mark_collected(&conn, request.id)?;
        if let Some(giver) = users::find_by_id(&conn, request.receiver_refer)? {
            approved_requests.push(UserResponse::public(&giver));
        }
    }

    Ok(Json(LifeRequestsResponse {
        incoming_requests,
        approved_requests,
    }))
}

/// POST /giveLife: grant lives to users who asked. Only requests that were
/// actually pending trigger a notification.
pub async fn give(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<GiveLifeRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;

    for requester_id in body.requester_refers {
        if lives::approve(&conn, requester_id, user.id)? {
            state.notifier.notify(
                NotificationKind::LifeGiven,
                requester_id,
                Some(user.username.clone()),
            );
        }
    }

    Ok((StatusCode::OK, Json(json!({}))))
}
