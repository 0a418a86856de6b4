use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Broad failure classes. Each maps to one HTTP status; the precise cause
/// travels in the `errorKey` field of the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    StateViolation,
    NotRelated,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Validation
            | ErrorKind::Conflict
            | ErrorKind::StateViolation
            | ErrorKind::NotRelated => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("validation failed: {0}")]
    Validation(&'static str),

    #[error("game not found")]
    GameNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("challenged opponent not found")]
    OpponentNotFound,
    #[error("receiver not found")]
    ReceiverNotFound,
    #[error("friend request not found")]
    FriendRequestNotFound,
    #[error("no open game matches the request")]
    NoMatchingGame,

    #[error("an uncompleted game between the two players is already open")]
    GameAlreadyOpen,
    #[error("a score was already recorded for this side")]
    ScoreAlreadySaved,
    #[error("users are already friends")]
    AlreadyFriends,
    #[error("a friend request between the users is already pending")]
    FriendRequestPending,
    #[error("email is already assigned to another account")]
    EmailAlreadyAssigned,
    #[error("username is already assigned to another account")]
    UsernameAlreadyAssigned,
    #[error("username is taken")]
    UsernameTaken,

    #[error("game side is not pending")]
    GameNotPending,
    #[error("game side is not started")]
    GameNotStarted,
    #[error("game is not ready to be completed")]
    GameNotCompleted,
    #[error("guest accounts cannot log in")]
    GuestLoginNotSupported,

    #[error("user is not a participant of this game")]
    GameNotRelated,
    #[error("friend request is addressed to another user")]
    FriendRequestNotReceiver,
    #[error("users cannot friend themselves")]
    CanNotFriendYourself,

    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid one-time code")]
    InvalidCode,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GameError {
    /// Stable machine-readable key delivered to clients as `errorKey`.
    pub fn key(&self) -> &'static str {
        match self {
            GameError::Validation(key) => key,
            GameError::GameNotFound => "game_not_found",
            GameError::UserNotFound => "user_not_found",
            GameError::OpponentNotFound => "game_opponent_not_found",
            GameError::ReceiverNotFound => "receiver_not_found",
            GameError::FriendRequestNotFound => "friend_request_not_found",
            GameError::NoMatchingGame => "no_matching_game",
            GameError::GameAlreadyOpen => "game_already_open",
            GameError::ScoreAlreadySaved => "score_already_saved",
            GameError::AlreadyFriends => "already_friends",
            GameError::FriendRequestPending => "friend_request_pending",
            GameError::EmailAlreadyAssigned => "register_email_already_assigned",
            GameError::UsernameAlreadyAssigned => "register_username_already_assigned",
            GameError::UsernameTaken => "username_taken",
            GameError::GameNotPending => "game_not_pending",
            GameError::GameNotStarted => "game_not_started",
            GameError::GameNotCompleted => "game_not_completed",
            GameError::GuestLoginNotSupported => "guest_login_not_supported",
            GameError::GameNotRelated => "game_not_related",
            GameError::FriendRequestNotReceiver => "friend_request_not_receiver",
            GameError::CanNotFriendYourself => "can_not_friend_yourself",
            GameError::InvalidToken => "invalid_token",
            GameError::InvalidCode => "invalid_code",
            GameError::Internal(_) => "internal_error",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Validation(_) | GameError::InvalidCode => ErrorKind::Validation,
            GameError::GameNotFound
            | GameError::UserNotFound
            | GameError::OpponentNotFound
            | GameError::ReceiverNotFound
            | GameError::FriendRequestNotFound
            | GameError::NoMatchingGame => ErrorKind::NotFound,
            GameError::GameAlreadyOpen
            | GameError::ScoreAlreadySaved
            | GameError::AlreadyFriends
            | GameError::FriendRequestPending
            | GameError::EmailAlreadyAssigned
            | GameError::UsernameAlreadyAssigned
            | GameError::UsernameTaken => ErrorKind::Conflict,
            GameError::GameNotPending
            | GameError::GameNotStarted
            | GameError::GameNotCompleted
            | GameError::GuestLoginNotSupported => ErrorKind::StateViolation,
            GameError::GameNotRelated
            | GameError::FriendRequestNotReceiver
            | GameError::CanNotFriendYourself => ErrorKind::NotRelated,
            GameError::InvalidToken => ErrorKind::Unauthorized,
            GameError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for GameError {
    fn from(err: rusqlite::Error) -> Self {
        GameError::Internal(anyhow::Error::new(err))
    }
}

/// Wire envelope for failures: `{"errorKey": "...", "language": "..."}`.
/// `language` is only filled in by request extractors, which know the
/// caller's locale before a handler ever runs.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "errorKey")]
    pub error_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        if let GameError::Internal(err) = &self {
            log::error!("request failed: {err:#}");
        }
        let body = ErrorBody {
            error_key: self.key().to_string(),
            language: None,
        };
        (self.kind().status(), Json(body)).into_response()
    }
}
