use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::levels;
use super::models::User;

pub const LANGUAGE_GERMAN: &str = "de_DE";
pub const LANGUAGE_ENGLISH: &str = "en_US";

const USER_COLUMNS: &str = "id, username, email, language, guest, avatar, is_verified, score, games_played_count, games_won_count, level, level_refer, top_level, top_level_refer, created_at, updated_at";

/// Collapses whatever the client sent onto the two supported locales.
pub fn normalize_language(language: &str) -> &'static str {
    match language {
        "de" | "de_DE" => LANGUAGE_GERMAN,
        _ => LANGUAGE_ENGLISH,
    }
}

pub fn insert_user(
    conn: &Connection,
    username: &str,
    email: Option<&str>,
    language: &str,
    guest: bool,
    score: i64,
) -> Result<User> {
    let now = Utc::now().naive_utc();
    let level = levels::find_by_score(conn, score)?;
    let sql = format!(
        "INSERT INTO users (username, email, language, guest, score, level, level_refer, top_level, top_level_refer, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6, ?7, ?8, ?8) RETURNING {USER_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![
            username,
            email,
            normalize_language(language),
            guest,
            score,
            level.name,
            level.id,
            now
        ],
        parse_user_row,
    )
    .context("Failed to insert user")
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_user_row)
        .optional()
        .context("Failed to find user by id")
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");

    conn.query_row(&sql, params![username], parse_user_row)
        .optional()
        .context("Failed to find user by username")
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");

    conn.query_row(&sql, params![email], parse_user_row)
        .optional()
        .context("Failed to find user by email")
}

pub fn is_username_taken(conn: &Connection, username: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .context("Failed to check username")?;
    Ok(count > 0)
}

pub fn is_email_taken(conn: &Connection, email: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .context("Failed to check email")?;
    Ok(count > 0)
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .context("Failed to count users")
}

/// Persists the user and refreshes the derived progression fields: the
/// current band always follows the score, the top band only ever climbs.
pub fn save(conn: &Connection, user: &mut User) -> Result<()> {
    user.language = normalize_language(&user.language).to_string();

    let level = levels::find_by_score(conn, user.score)?;
    user.level = level.name.clone();
    user.level_refer = level.id;

    let top_behind = match levels::find_by_id(conn, user.top_level_refer)? {
        Some(top) => top.order_index < level.order_index,
        None => true,
    };
    if top_behind {
        user.top_level = level.name;
        user.top_level_refer = level.id;
    }

    user.updated_at = Utc::now().naive_utc();

    conn.execute(
        "UPDATE users SET username = ?2, email = ?3, language = ?4, guest = ?5, avatar = ?6, is_verified = ?7, score = ?8, games_played_count = ?9, games_won_count = ?10, level = ?11, level_refer = ?12, top_level = ?13, top_level_refer = ?14, updated_at = ?15 WHERE id = ?1",
        params![
            user.id,
            user.username,
            user.email,
            user.language,
            user.guest,
            user.avatar,
            user.is_verified,
            user.score,
            user.games_played_count,
            user.games_won_count,
            user.level,
            user.level_refer,
            user.top_level,
            user.top_level_refer,
            user.updated_at
        ],
    )
    .context("Failed to save user")?;

    Ok(())
}

/// Substring search across usernames and emails.
pub fn search(conn: &Connection, term: &str) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username LIKE ?1 OR email LIKE ?1 ORDER BY username ASC"
    );
    let pattern = format!("%{term}%");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![pattern], parse_user_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// The best players inside one level band, highest score first.
pub fn toplist(conn: &Connection, level_refer: i64, limit: i64) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE level_refer = ?1 ORDER BY score DESC LIMIT ?2"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![level_refer, limit], parse_user_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// One-based position within the band: players with a strictly higher score
/// rank ahead, ties share a rank.
pub fn rank_in_level(conn: &Connection, level_refer: i64, score: i64) -> Result<i64> {
    let ahead: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM users WHERE level_refer = ?1 AND score > ?2",
            params![level_refer, score],
            |row| row.get(0),
        )
        .context("Failed to compute rank")?;

    Ok(ahead + 1)
}

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        language: row.get(3)?,
        guest: row.get(4)?,
        avatar: row.get(5)?,
        is_verified: row.get(6)?,
        score: row.get(7)?,
        games_played_count: row.get(8)?,
        games_won_count: row.get(9)?,
        level: row.get(10)?,
        level_refer: row.get(11)?,
        top_level: row.get(12)?,
        top_level_refer: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}
