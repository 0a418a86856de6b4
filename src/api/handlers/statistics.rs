use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;

use crate::api::extract::CurrentUser;
use crate::api::models::{RankResponse, ToplistParams, UserResponse};
use crate::database::{get_connection, levels, users};
use crate::errors::GameError;

use super::AppState;

/// GET /statistics/toplist?rank=Name
///
/// Best players of one level band, highest score first. Defaults to the
/// caller's band; an unknown band name falls back to the lowest one.
pub async fn toplist(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ToplistParams>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;

    let level_refer = match params.rank.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => levels::find_by_name(&conn, name)?.id,
        _ => user.level_refer,
    };

    let leaders = users::toplist(&conn, level_refer, state.config.auth.toplist_size)?
        .iter()
        .map(UserResponse::public)
        .collect::<Vec<_>>();

    Ok(Json(leaders))
}

/// GET /statistics/rank: the caller's 1-based position inside their band.
/// Equal scores share a rank.
pub async fn rank(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let rank = users::rank_in_level(&conn, user.level_refer, user.score)?;

    Ok(Json(RankResponse {
        user: UserResponse::own(&user),
        rank,
    }))
}
