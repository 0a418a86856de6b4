use anyhow::{Context, Result};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::PushToken;
use crate::config::AuthSettings;

/// Creates and stores a fresh opaque bearer token for the user. A user can
/// hold several tokens at once, one per signed-in device.
pub fn issue_auth_token(
    conn: &Connection,
    user_id: i64,
    settings: &AuthSettings,
) -> Result<String> {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(settings.token_length)
        .map(char::from)
        .collect();
    let now = Utc::now().naive_utc();

    conn.execute(
        "INSERT INTO auth_tokens (user_refer, token, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![user_id, token, now],
    )
    .context("Failed to store auth token")?;

    Ok(token)
}

pub fn find_user_id_by_token(conn: &Connection, token: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT user_refer FROM auth_tokens WHERE token = ?1",
        params![token],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up auth token")
}

/// Creates a one-time numeric code. For email verification the address being
/// verified rides along until the code is redeemed.
pub fn create_login_code(
    conn: &Connection,
    user_id: i64,
    settings: &AuthSettings,
    verify_email: Option<&str>,
) -> Result<String> {
    let code = rand::thread_rng()
        .gen_range(settings.login_code_low..settings.login_code_high)
        .to_string();
    let now = Utc::now().naive_utc();

    conn.execute(
        "INSERT INTO login_codes (user_refer, code, is_verify_email, email, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![user_id, code, verify_email.is_some(), verify_email, now],
    )
    .context("Failed to store login code")?;

    Ok(code)
}

/// Redeems a login code. The code is deleted on first use.
pub fn consume_login_code(conn: &Connection, user_id: i64, code: &str) -> Result<bool> {
    let rows = conn
        .execute(
            "DELETE FROM login_codes WHERE user_refer = ?1 AND code = ?2",
            params![user_id, code],
        )
        .context("Failed to consume login code")?;

    Ok(rows > 0)
}

/// Redeems an email-verification code and yields the address it was issued
/// for. Plain login codes never match here.
pub fn consume_email_code(
    conn: &Connection,
    user_id: i64,
    code: &str,
) -> Result<Option<String>> {
    let found: Option<(i64, Option<String>)> = conn
        .query_row(
            "SELECT id, email FROM login_codes WHERE user_refer = ?1 AND code = ?2 AND is_verify_email = 1",
            params![user_id, code],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .context("Failed to look up email code")?;

    match found {
        Some((id, email)) => {
            conn.execute("DELETE FROM login_codes WHERE id = ?1", params![id])
                .context("Failed to consume email code")?;
            Ok(email)
        }
        None => Ok(None),
    }
}

/// Registers a device push token. A token already known from another account
/// moves over to the new one, since devices change hands between accounts.
pub fn upsert_push_token(
    conn: &Connection,
    user_id: i64,
    token: &str,
    platform: &str,
) -> Result<()> {
    let now = Utc::now().naive_utc();

    conn.execute(
        "INSERT INTO push_tokens (user_refer, token, platform, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4) ON CONFLICT (token) DO UPDATE SET user_refer = ?1, platform = ?3, updated_at = ?4",
        params![user_id, token, platform, now],
    )
    .context("Failed to upsert push token")?;

    Ok(())
}

pub fn delete_push_token(conn: &Connection, token: &str) -> Result<usize> {
    conn.execute("DELETE FROM push_tokens WHERE token = ?1", params![token])
        .context("Failed to delete push token")
}

pub fn list_push_tokens(conn: &Connection, user_id: i64) -> Result<Vec<PushToken>> {
    let sql = "SELECT id, user_refer, token, platform FROM push_tokens WHERE user_refer = ?1";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(PushToken {
                id: row.get(0)?,
                user_refer: row.get(1)?,
                token: row.get(2)?,
                platform: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}
