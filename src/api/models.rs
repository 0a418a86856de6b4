use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::database::{Game, User};
use crate::errors::GameError;

/// Ids arrive as numbers from newer clients and as strings from older ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdParam {
    Num(i64),
    Text(String),
}

impl IdParam {
    pub fn resolve(&self) -> Result<i64, GameError> {
        match self {
            IdParam::Num(n) => Ok(*n),
            IdParam::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| GameError::Validation("invalid_user_id")),
        }
    }

    /// Missing values and empty strings both mean "not provided".
    pub fn resolve_optional(param: Option<&IdParam>) -> Result<Option<i64>, GameError> {
        match param {
            None => Ok(None),
            Some(IdParam::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(param) => param.resolve().map(Some),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub username: String,
    pub email: Option<String>,
    pub language: String,
    pub guest: bool,
    pub avatar: i64,
    pub is_verified: bool,
    pub score: i64,
    pub games_played_count: i64,
    pub games_won_count: i64,
    pub level: String,
    pub level_refer: i64,
    pub top_level: String,
    pub top_level_refer: i64,
}

impl UserResponse {
    /// The caller's own account, email included.
    pub fn own(user: &User) -> Self {
        Self {
            id: user.id,
            created_at: user.created_at,
            updated_at: user.updated_at,
            username: user.username.clone(),
            email: user.email.clone(),
            language: user.language.clone(),
            guest: user.guest,
            avatar: user.avatar,
            is_verified: user.is_verified,
            score: user.score,
            games_played_count: user.games_played_count,
            games_won_count: user.games_won_count,
            level: user.level.clone(),
            level_refer: user.level_refer,
            top_level: user.top_level.clone(),
            top_level_refer: user.top_level_refer,
        }
    }

    /// Somebody else's profile: identical shape, email withheld.
    pub fn public(user: &User) -> Self {
        let mut response = Self::own(user);
        response.email = None;
        response
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub creator_id: i64,
    pub opponent_id: Option<i64>,
    pub creator: Option<UserResponse>,
    pub opponent: Option<UserResponse>,
    pub won_id: Option<i64>,
    pub lost_id: Option<i64>,
    pub state_creator: i64,
    pub state_opponent: i64,
    pub score_creator: i64,
    pub score_opponent: i64,
    pub start_time_creator: Option<NaiveDateTime>,
    pub start_time_opponent: Option<NaiveDateTime>,
    pub from_friend_request: bool,
    #[serde(rename = "accepted")]
    pub friend_request_accepted: bool,
    #[serde(rename = "friendRequestTime")]
    pub friend_request_accepted_time: Option<NaiveDateTime>,
    #[serde(rename = "type")]
    pub game_type: String,
    pub map_id: i64,
    #[serde(rename = "levelId")]
    pub level_refer: i64,
    pub completed: bool,
    pub auto_completed: bool,
}

impl GameResponse {
    pub fn new(game: &Game, creator: Option<&User>, opponent: Option<&User>) -> Self {
        Self {
            id: game.id,
            created_at: game.created_at,
            updated_at: game.updated_at,
            creator_id: game.creator_refer,
            opponent_id: game.opponent_refer,
            creator: creator.map(UserResponse::public),
            opponent: opponent.map(UserResponse::public),
            won_id: game.won_refer,
            lost_id: game.lost_refer,
            state_creator: game.state_creator.as_i64(),
            state_opponent: game.state_opponent.as_i64(),
            score_creator: game.score_creator,
            score_opponent: game.score_opponent,
            start_time_creator: game.start_time_creator,
            start_time_opponent: game.start_time_opponent,
            from_friend_request: game.from_friend_request,
            friend_request_accepted: game.friend_request_accepted,
            friend_request_accepted_time: game.friend_request_accepted_time,
            game_type: game.game_type.clone(),
            map_id: game.map_id,
            level_refer: game.level_refer,
            completed: game.completed,
            auto_completed: game.auto_completed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username, clients send either in the same field.
    pub data: String,
}

#[derive(Debug, Serialize, Default)]
pub struct LoginResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub user_id: IdParam,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub avatar: Option<i64>,
    pub language: Option<String>,
    pub email: Option<String>,
    pub verify_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PushTokenRequest {
    pub token: String,
    #[serde(default)]
    pub platform: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestCreate {
    pub friend_id: IdParam,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendAccept {
    pub friend_request_id: IdParam,
}

#[derive(Debug, Serialize)]
pub struct FriendRequestsResponse {
    pub open: Vec<OpenFriendRequestItem>,
    pub pending: Vec<PendingFriendRequestItem>,
}

/// A request somebody sent to the caller.
#[derive(Debug, Serialize)]
pub struct OpenFriendRequestItem {
    pub id: i64,
    pub requester: UserResponse,
}

/// A request the caller sent that was not answered yet.
#[derive(Debug, Serialize)]
pub struct PendingFriendRequestItem {
    pub id: i64,
    pub receiver: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub id: i64,
    pub username: String,
    pub level: String,
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct ToplistParams {
    pub rank: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RankResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub rank: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub friend_id: Option<IdParam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameHistoryRequest {
    pub friend_id: Option<IdParam>,
}

#[derive(Debug, Deserialize)]
pub struct GameResultRequest {
    pub data: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeRequestCreate {
    pub receiver_refers: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiveLifeRequest {
    pub requester_refers: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeRequestsResponse {
    pub incoming_requests: Vec<UserResponse>,
    pub approved_requests: Vec<UserResponse>,
}
