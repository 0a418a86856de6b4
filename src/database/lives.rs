use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use super::models::LifeRequest;

const LIFE_COLUMNS: &str = "id, requester_refer, receiver_refer, approved, collected, created_at";

/// True when the requester already has an unanswered request towards the
/// receiver, so asking again would only duplicate it.
pub fn pending_exists(conn: &Connection, requester: i64, receiver: i64) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM life_requests WHERE requester_refer = ?1 AND receiver_refer = ?2 AND approved = 0 AND collected = 0",
            params![requester, receiver],
            |row| row.get(0),
        )
        .context("Failed to check pending life request")?;

    Ok(count > 0)
}

pub fn insert_life_request(
    conn: &Connection,
    requester: i64,
    receiver: i64,
) -> Result<LifeRequest> {
    let now = Utc::now().naive_utc();
    let sql = format!(
        "INSERT INTO life_requests (requester_refer, receiver_refer, created_at, updated_at) VALUES (?1, ?2, ?3, ?3) RETURNING {LIFE_COLUMNS}"
    );

    conn.query_row(&sql, params![requester, receiver, now], parse_life_row)
        .context("Failed to insert life request")
}

/// Users still waiting for the receiver to hand over a life.
pub fn incoming_requester_ids(conn: &Connection, receiver: i64) -> Result<Vec<i64>> {
    let sql = "SELECT requester_refer FROM life_requests WHERE receiver_refer = ?1 AND approved = 0 AND collected = 0 ORDER BY created_at ASC";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![receiver], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    Ok(rows)
}

/// Lives granted to the requester that the client has not picked up yet.
pub fn approved_uncollected(conn: &Connection, requester: i64) -> Result<Vec<LifeRequest>> {
    let sql = format!(
        "SELECT {LIFE_COLUMNS} FROM life_requests WHERE requester_refer = ?1 AND approved = 1 AND collected = 0 ORDER BY created_at ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![requester], parse_life_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn mark_collected(conn: &Connection, id: i64) -> Result<()> {
    let now = Utc::now().naive_utc();
    conn.execute(
        "UPDATE life_requests SET collected = 1, updated_at = ?2 WHERE id = ?1",
        params![id, now],
    )
    .context("Failed to mark life request collected")?;

    Ok(())
}

/// Grants a life. Returns false when there was nothing to approve, so a
/// repeated grant never fires a second notification.
pub fn approve(conn: &Connection, requester: i64, receiver: i64) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let rows = conn
        .execute(
            "UPDATE life_requests SET approved = 1, updated_at = ?3 WHERE requester_refer = ?1 AND receiver_refer = ?2 AND approved = 0",
            params![requester, receiver, now],
        )
        .context("Failed to approve life request")?;

    Ok(rows > 0)
}

/// Drops unanswered requests older than the cutoff.
pub fn delete_expired_unapproved(conn: &Connection, cutoff: NaiveDateTime) -> Result<usize> {
    conn.execute(
        "DELETE FROM life_requests WHERE approved = 0 AND created_at <= ?1",
        params![cutoff],
    )
    .context("Failed to delete expired life requests")
}

fn parse_life_row(row: &rusqlite::Row) -> rusqlite::Result<LifeRequest> {
    Ok(LifeRequest {
        id: row.get(0)?,
        requester_refer: row.get(1)?,
        receiver_refer: row.get(2)?,
        approved: row.get(3)?,
        collected: row.get(4)?,
        created_at: row.get(5)?,
    })
}
