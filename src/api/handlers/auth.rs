use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rusqlite::Connection;

use crate::api::extract::ApiJson;
use crate::api::models::{
    AuthResponse, LoginRequest, LoginResponse, RegisterRequest, UserResponse, VerifyCodeRequest,
};
use crate::config::AuthSettings;
use crate::database::{User, get_connection, tokens, users};
use crate::errors::GameError;

use super::AppState;

/// POST /auth/register
///
/// Accounts with an email address go through the login-code flow; accounts
/// without one become guests and get their token right away.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let settings = &state.config.auth;

    let username = body.username.trim();
    if username.chars().count() < settings.min_username_length {
        return Err(GameError::Validation("username_too_short"));
    }

    let email = body
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty());

    if let Some(email) = email {
        if users::is_email_taken(&conn, email)? {
            return Err(GameError::EmailAlreadyAssigned);
        }
    }
    if users::is_username_taken(&conn, username)? {
        return Err(GameError::UsernameAlreadyAssigned);
    }

    let guest = email.is_none();
    let language = body.language.as_deref().unwrap_or(users::LANGUAGE_ENGLISH);
    let user = users::insert_user(
        &conn,
        username,
        email,
        language,
        guest,
        state.config.engine.starter_score,
    )?;

    let token = if guest {
        Some(tokens::issue_auth_token(&conn, user.id, settings)?)
    } else {
        let code = tokens::create_login_code(&conn, user.id, settings, None)?;
        dispatch_login_code(&user, &code);
        None
    };

    let response = AuthResponse {
        user: UserResponse::own(&user),
        token,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login
///
/// Always answers 200 with at most {id, username} so the endpoint gives no
/// oracle for probing which accounts exist.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let needle = body.data.trim();

    let found = if needle.contains('@') {
        users::find_by_email(&conn, needle)?
    } else {
        users::find_by_username(&conn, needle)?
    };

    let Some(user) = found else {
        return Ok(Json(LoginResponse::default()));
    };
    if user.guest {
        return Err(GameError::GuestLoginNotSupported);
    }

    let code = tokens::create_login_code(&conn, user.id, &state.config.auth, None)?;
    dispatch_login_code(&user, &code);

    Ok(Json(LoginResponse {
        id: user.id,
        username: user.username,
    }))
}

/// POST /auth/verifycode
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<VerifyCodeRequest>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let user_id = body.user_id.resolve()?;

    // An unknown user id reads the same as a wrong code on purpose.
    let Some(user) = users::find_by_id(&conn, user_id)? else {
        return Err(GameError::InvalidCode);
    };
    if !tokens::consume_login_code(&conn, user.id, body.code.trim())? {
        return Err(GameError::InvalidCode);
    }

    let token = tokens::issue_auth_token(&conn, user.id, &state.config.auth)?;
    Ok(Json(AuthResponse {
        user: UserResponse::own(&user),
        token: Some(token),
    }))
}

/// POST /auth/createUser (v2): one-call guest account.
pub async fn create_guest(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, GameError> {
    let conn = get_connection(&state.pool)?;
    let settings = &state.config.auth;

    let username = next_guest_username(&conn, settings)?;
    let user = users::insert_user(
        &conn,
        &username,
        None,
        users::LANGUAGE_ENGLISH,
        true,
        state.config.engine.starter_score,
    )?;
    let token = tokens::issue_auth_token(&conn, user.id, settings)?;

    let response = AuthResponse {
        user: UserResponse::own(&user),
        token: Some(token),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

fn next_guest_username(conn: &Connection, settings: &AuthSettings) -> Result<String, GameError> {
    let mut serial = users::count_users(conn)? + 1;
    loop {
        let candidate = format!("{}{}", settings.guest_name_prefix, serial);
        if !users::is_username_taken(conn, &candidate)? {
            return Ok(candidate);
        }
        serial += 1;
    }
}

/// Email transport lives outside this service; the code lands in the log,
/// which doubles as the delivery channel in development.
fn dispatch_login_code(user: &User, code: &str) {
    log::info!(
        "login code for user {} <{}>: {}",
        user.id,
        user.email.as_deref().unwrap_or("-"),
        code
    );
}
