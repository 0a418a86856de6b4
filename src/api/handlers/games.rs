use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use rusqlite::Connection;

use crate::api::extract::{ApiJson, CurrentUser, OptionalJson};
use crate::api::models::{
    CreateGameRequest, GameHistoryRequest, GameResponse, GameResultRequest, IdParam,
};
use crate::database::{Game, games, get_connection, users};
use crate::errors::GameError;

use super::AppState;

/// GET /games: games waiting on the caller, i.e. the other seat already
/// played and the caller has not.
pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let games = games::list_awaiting_action(&conn, user.id)?;
    Ok(Json(with_profiles(&conn, games)?))
}

/// POST /games: challenge a friend, or let matchmaking find an opponent.
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    OptionalJson(body): OptionalJson<CreateGameRequest>,
) -> Result<impl IntoResponse, GameError> {
    let friend_id = IdParam::resolve_optional(body.and_then(|b| b.friend_id).as_ref())?;
    let game = state.engine.create(user.id, friend_id)?;

    let conn = get_connection(&state.pool)?;
    Ok(Json(profile_response(&conn, &game)?))
}

/// POST /games/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    OptionalJson(body): OptionalJson<GameHistoryRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let friend_id = IdParam::resolve_optional(body.and_then(|b| b.friend_id).as_ref())?;

    let games = match friend_id {
        Some(friend_id) => games::list_history_between(&conn, user.id, friend_id)?,
        None => games::list_history(&conn, user.id)?,
    };
    Ok(Json(with_profiles(&conn, games)?))
}

/// POST /games/:gameID/start
pub async fn start(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let game_id = parse_game_id(&game_id)?;
    let game = state.engine.start(game_id, user.id)?;

    let conn = get_connection(&state.pool)?;
    Ok(Json(profile_response(&conn, &game)?))
}

/// POST /games/:gameID/result
pub async fn result(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(game_id): Path<String>,
    ApiJson(body): ApiJson<GameResultRequest>,
) -> Result<impl IntoResponse, GameError> {
    let game_id = parse_game_id(&game_id)?;
    let game = state.engine.result(game_id, user.id, body.data)?;

    let conn = get_connection(&state.pool)?;
    Ok(Json(profile_response(&conn, &game)?))
}

fn parse_game_id(raw: &str) -> Result<i64, GameError> {
    raw.trim()
        .parse()
        .map_err(|_| GameError::Validation("invalid_game_id"))
}

fn with_profiles(conn: &Connection, games: Vec<Game>) -> Result<Vec<GameResponse>, GameError> {
    games
        .iter()
        .map(|game| profile_response(conn, game))
        .collect()
}

/// Clients render both seats from one payload, so the participants ride
/// along as embedded public profiles.
fn profile_response(conn: &Connection, game: &Game) -> Result<GameResponse, GameError> {
    let creator = users::find_by_id(conn, game.creator_refer)?;
    let opponent = match game.opponent_refer {
        Some(id) => users::find_by_id(conn, id)?,
        None => None,
    };
    Ok(GameResponse::new(
        game,
        creator.as_ref(),
        opponent.as_ref(),
    ))
}
