use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Friend, FriendRequest};

pub fn insert_friendship(conn: &Connection, requester: i64, receiver: i64) -> Result<Friend> {
    let now = Utc::now().naive_utc();

    conn.query_row(
        "INSERT INTO friends (requester_refer, receiver_refer, created_at, updated_at) VALUES (?1, ?2, ?3, ?3) RETURNING id, requester_refer, receiver_refer, created_at",
        params![requester, receiver, now],
        parse_friend_row,
    )
    .context("Failed to insert friendship")
}

pub fn are_friends(conn: &Connection, user_a: i64, user_b: i64) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM friends WHERE (requester_refer = ?1 AND receiver_refer = ?2) OR (requester_refer = ?2 AND receiver_refer = ?1)",
            params![user_a, user_b],
            |row| row.get(0),
        )
        .context("Failed to check friendship")?;

    Ok(count > 0)
}

/// Ids of everyone the user is friends with, regardless of who asked first.
pub fn list_friend_ids(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let sql = "SELECT CASE WHEN requester_refer = ?1 THEN receiver_refer ELSE requester_refer END FROM friends WHERE requester_refer = ?1 OR receiver_refer = ?1";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    Ok(rows)
}

pub fn delete_friendship(conn: &Connection, user_a: i64, user_b: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM friends WHERE (requester_refer = ?1 AND receiver_refer = ?2) OR (requester_refer = ?2 AND receiver_refer = ?1)",
        params![user_a, user_b],
    )
    .context("Failed to delete friendship")
}

pub fn insert_friend_request(
    conn: &Connection,
    requester: i64,
    receiver: i64,
) -> Result<FriendRequest> {
    let now = Utc::now().naive_utc();

    conn.query_row(
        "INSERT INTO friend_requests (requester_refer, receiver_refer, created_at, updated_at) VALUES (?1, ?2, ?3, ?3) RETURNING id, requester_refer, receiver_refer, created_at",
        params![requester, receiver, now],
        parse_request_row,
    )
    .context("Failed to insert friend request")
}

pub fn request_exists(conn: &Connection, requester: i64, receiver: i64) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM friend_requests WHERE requester_refer = ?1 AND receiver_refer = ?2",
            params![requester, receiver],
            |row| row.get(0),
        )
        .context("Failed to check friend request")?;

    Ok(count > 0)
}

pub fn find_request_by_id(conn: &Connection, id: i64) -> Result<Option<FriendRequest>> {
    conn.query_row(
        "SELECT id, requester_refer, receiver_refer, created_at FROM friend_requests WHERE id = ?1",
        params![id],
        parse_request_row,
    )
    .optional()
    .context("Failed to find friend request")
}

pub fn delete_request(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM friend_requests WHERE id = ?1", params![id])
        .context("Failed to delete friend request")?;
    Ok(())
}

/// Removes a request in one specific direction, used to clear the reciprocal
/// request when two users asked each other.
pub fn delete_request_between(conn: &Connection, requester: i64, receiver: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM friend_requests WHERE requester_refer = ?1 AND receiver_refer = ?2",
        params![requester, receiver],
    )
    .context("Failed to delete friend request between users")
}

/// Requests waiting for the user's answer.
pub fn list_requests_received(conn: &Connection, receiver: i64) -> Result<Vec<FriendRequest>> {
    let sql = "SELECT id, requester_refer, receiver_refer, created_at FROM friend_requests WHERE receiver_refer = ?1 ORDER BY created_at ASC";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![receiver], parse_request_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Requests the user sent that nobody answered yet.
pub fn list_requests_sent(conn: &Connection, requester: i64) -> Result<Vec<FriendRequest>> {
    let sql = "SELECT id, requester_refer, receiver_refer, created_at FROM friend_requests WHERE requester_refer = ?1 ORDER BY created_at ASC";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![requester], parse_request_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn parse_friend_row(row: &rusqlite::Row) -> rusqlite::Result<Friend> {
    Ok(Friend {
        id: row.get(0)?,
        requester_refer: row.get(1)?,
        receiver_refer: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn parse_request_row(row: &rusqlite::Row) -> rusqlite::Result<FriendRequest> {
    Ok(FriendRequest {
        id: row.get(0)?,
        requester_refer: row.get(1)?,
        receiver_refer: row.get(2)?,
        created_at: row.get(3)?,
    })
}
