use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::api::extract::{ApiJson, CurrentUser};
use crate::api::models::{SearchRequest, SearchResultItem};
use crate::database::{get_connection, users};
use crate::errors::GameError;

use super::AppState;

/// POST /search: substring match on username or email. Only the public
/// fields of each hit go out.
pub async fn users(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    ApiJson(body): ApiJson<SearchRequest>,
) -> Result<impl IntoResponse, GameError> {
    let term = body.data.trim();
    if term.chars().count() < state.config.auth.min_search_length {
        return Err(GameError::Validation("search_min_length"));
    }

    let conn = get_connection(&state.pool)?;
    let hits = users::search(&conn, term)?
        .into_iter()
        .map(|user| SearchResultItem {
            id: user.id,
            username: user.username,
            level: user.level,
            score: user.score,
        })
        .collect::<Vec<_>>();

    Ok(Json(hits))
}
