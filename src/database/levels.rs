use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::Level;

/// Progression bands, ordered from entry level to the ceiling. Scores are
/// inclusive on both ends and the bands are contiguous.
const LEVEL_BANDS: &[(&str, i64, i64, i64)] = &[
    ("Novice", 0, 399, 1),
    ("Greenhorn", 400, 799, 2),
    ("Expert", 800, 1099, 3),
    ("Master", 1100, 1399, 4),
    ("Grand Master", 1400, 1699, 5),
    ("Legend", 1700, 1999, 6),
    ("Divine", 2000, 2999, 7),
    ("Splasher", 3000, 9_999_999, 8),
];

const LEVEL_COLUMNS: &str = "id, name, from_score, to_score, order_index";

/// Inserts the level bands. Idempotent: existing bands are left untouched.
pub fn seed_levels(conn: &Connection) -> Result<()> {
    let now = Utc::now().naive_utc();
    for (name, from_score, to_score, order_index) in LEVEL_BANDS {
        conn.execute(
            "INSERT OR IGNORE INTO levels (name, from_score, to_score, order_index, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![name, from_score, to_score, order_index, now],
        )
        .with_context(|| format!("Failed to seed level {name}"))?;
    }
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Level>> {
    let sql = format!("SELECT {LEVEL_COLUMNS} FROM levels WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_level_row)
        .optional()
        .context("Failed to find level by id")
}

/// The band a score falls into. Scores outside every band resolve to the
/// lowest band so the lookup is total.
pub fn find_by_score(conn: &Connection, score: i64) -> Result<Level> {
    let sql = format!(
        "SELECT {LEVEL_COLUMNS} FROM levels WHERE from_score <= ?1 AND to_score >= ?1 ORDER BY order_index ASC LIMIT 1"
    );

    let level = conn
        .query_row(&sql, params![score], parse_level_row)
        .optional()
        .context("Failed to find level by score")?;

    match level {
        Some(level) => Ok(level),
        None => lowest(conn),
    }
}

/// Looks a band up by its display name, falling back to the lowest band for
/// unknown names.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Level> {
    let sql = format!("SELECT {LEVEL_COLUMNS} FROM levels WHERE name = ?1");

    let level = conn
        .query_row(&sql, params![name], parse_level_row)
        .optional()
        .context("Failed to find level by name")?;

    match level {
        Some(level) => Ok(level),
        None => lowest(conn),
    }
}

fn lowest(conn: &Connection) -> Result<Level> {
    let sql = format!("SELECT {LEVEL_COLUMNS} FROM levels ORDER BY order_index ASC LIMIT 1");

    conn.query_row(&sql, [], parse_level_row)
        .context("Levels are not seeded")
}

fn parse_level_row(row: &rusqlite::Row) -> rusqlite::Result<Level> {
    Ok(Level {
        id: row.get(0)?,
        name: row.get(1)?,
        from_score: row.get(2)?,
        to_score: row.get(3)?,
        order_index: row.get(4)?,
    })
}
