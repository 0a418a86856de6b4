use std::sync::Arc;

use axum::Json;
use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use crate::database::users::{LANGUAGE_ENGLISH, LANGUAGE_GERMAN};
use crate::database::{tokens, users};
use crate::errors::ErrorBody;

use super::handlers::AppState;

/// The authenticated caller, resolved from the `Authorization` header.
///
/// Every route except registration and login goes through this extractor,
/// so handlers never see an unauthenticated request.
pub struct CurrentUser(pub crate::database::User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let language = language_from_headers(&parts.headers);
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(unauthorized(language));
        };

        let conn = match state.pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                log::error!("failed to get database connection: {err}");
                return Err(internal_error(language));
            }
        };

        let user_id = match tokens::find_user_id_by_token(&conn, &token) {
            Ok(Some(id)) => id,
            Ok(None) => return Err(unauthorized(language)),
            Err(err) => {
                log::error!("token lookup failed: {err:#}");
                return Err(internal_error(language));
            }
        };

        match users::find_by_id(&conn, user_id) {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => Err(unauthorized(language)),
            Err(err) => {
                log::error!("user lookup failed: {err:#}");
                Err(internal_error(language))
            }
        }
    }
}

/// `axum::Json` with the error envelope clients expect: malformed bodies
/// come back as 400 with an `errorKey` instead of a plain-text rejection.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let language = language_from_headers(req.headers());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(_) => Err(invalid_request(language)),
        }
    }
}

/// Like [`ApiJson`] but tolerates an absent or empty body, which mobile
/// clients send on endpoints where every field is optional.
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let language = language_from_headers(req.headers());
        let bytes = match Bytes::from_request(req, state).await {
            Ok(bytes) => bytes,
            Err(_) => return Err(invalid_request(language)),
        };
        if bytes.is_empty() {
            return Ok(OptionalJson(None));
        }
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(OptionalJson(Some(value))),
            Err(_) => Err(invalid_request(language)),
        }
    }
}

/// Maps the first `Accept-Language` tag onto one of the two supported
/// locales. Returns `None` when the header is absent so error envelopes
/// can leave the field out entirely.
pub fn language_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;
    let tag = raw.split(',').next()?.split(';').next()?.trim();
    if tag.is_empty() {
        return None;
    }
    if tag.to_ascii_lowercase().starts_with("de") {
        Some(LANGUAGE_GERMAN.to_string())
    } else {
        Some(LANGUAGE_ENGLISH.to_string())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn unauthorized(language: Option<String>) -> Response {
    error_response(StatusCode::UNAUTHORIZED, "invalid_token", language)
}

fn invalid_request(language: Option<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "invalid_request", language)
}

fn internal_error(language: Option<String>) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", language)
}

fn error_response(status: StatusCode, key: &str, language: Option<String>) -> Response {
    let body = ErrorBody {
        error_key: key.to_string(),
        language,
    };
    (status, Json(body)).into_response()
}
