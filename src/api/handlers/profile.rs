use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::api::extract::{ApiJson, CurrentUser};
use crate::api::models::{
    LanguageRequest, ProfileUpdateRequest, PushTokenRequest, UpdateUserRequest, UserResponse,
    VerifyEmailRequest,
};
use crate::database::{get_connection, tokens, users};
use crate::errors::GameError;

use super::AppState;

/// GET /profile
pub async fn show(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(UserResponse::own(&user))
}

/// PUT /profile
///
/// Starts an email change: stores a verification code carrying the new
/// address. Nothing on the account moves until the code is redeemed.
pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let email = body.email.trim();

    if email.is_empty() || !email.contains('@') {
        return Err(GameError::Validation("invalid_email"));
    }
    if users::is_email_taken(&conn, email)? {
        return Err(GameError::EmailAlreadyAssigned);
    }

    let code = tokens::create_login_code(&conn, user.id, &state.config.auth, Some(email))?;
    log::info!("email verification code for user {}: {}", user.id, code);

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /profile/language
pub async fn set_language(
    State(state): State<Arc<AppState>>,
    CurrentUser(mut user): CurrentUser,
    ApiJson(body): ApiJson<LanguageRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;

    user.language = body.language;
    users::save(&conn, &mut user)?;

    Ok(Json(UserResponse::own(&user)))
}

/// POST /profile/verifyemail
///
/// Redeems the code from PUT /profile and applies the address it carried.
/// A guest account stops being a guest the moment it has a verified way
/// to log back in.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    CurrentUser(mut user): CurrentUser,
    ApiJson(body): ApiJson<VerifyEmailRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;

    let Some(email) = tokens::consume_email_code(&conn, user.id, body.code.trim())? else {
        return Err(GameError::InvalidCode);
    };
    if users::is_email_taken(&conn, &email)? {
        return Err(GameError::EmailAlreadyAssigned);
    }

    user.email = Some(email);
    user.guest = false;
    users::save(&conn, &mut user)?;

    Ok(Json(UserResponse::own(&user)))
}

/// POST /auth/updateUser (v2)
///
/// Patch-style profile update: only fields present in the body are touched.
/// An email change additionally needs the verification code and marks the
/// account verified.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(mut user): CurrentUser,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let settings = &state.config.auth;

    if let Some(username) = &body.username {
        let username = username.trim();
        if username.chars().count() < settings.min_username_length {
            return Err(GameError::Validation("username_too_short"));
        }
        if username != user.username && users::is_username_taken(&conn, username)? {
            return Err(GameError::UsernameTaken);
        }
        user.username = username.to_string();
    }

    if let Some(avatar) = body.avatar {
        user.avatar = avatar;
    }
    if let Some(language) = &body.language {
        user.language = language.clone();
    }

    if let Some(email) = &body.email {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(GameError::Validation("invalid_email"));
        }

        let code = body.verify_code.as_deref().unwrap_or("");
        if !tokens::consume_login_code(&conn, user.id, code.trim())? {
            return Err(GameError::InvalidCode);
        }

        let taken = match users::find_by_email(&conn, email)? {
            Some(owner) => owner.id != user.id,
            None => false,
        };
        if taken {
            return Err(GameError::EmailAlreadyAssigned);
        }

        user.email = Some(email.to_string());
        user.is_verified = true;
        user.guest = false;
    }

    users::save(&conn, &mut user)?;
    Ok(Json(UserResponse::own(&user)))
}

/// POST /profile/pushtoken
pub async fn register_push_token(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<PushTokenRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    tokens::upsert_push_token(&conn, user.id, body.token.trim(), &body.platform)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /profile/pushtoken removes a device registration, e.g. on logout.
pub async fn remove_push_token(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    ApiJson(body): ApiJson<PushTokenRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    tokens::delete_push_token(&conn, body.token.trim())?;
    Ok(StatusCode::NO_CONTENT)
}
