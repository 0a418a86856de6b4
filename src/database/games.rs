use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Game, Side, SideState};

const GAME_COLUMNS: &str = "id, creator_refer, opponent_refer, won_refer, lost_refer, state_creator, state_opponent, score_creator, score_opponent, start_time_creator, start_time_opponent, from_friend_request, friend_request_accepted, friend_request_accepted_time, game_type, map_id, level_refer, completed, auto_completed, created_at, updated_at, deleted_at";

pub fn insert_game(
    conn: &Connection,
    creator_refer: i64,
    opponent_refer: Option<i64>,
    from_friend_request: bool,
    game_type: &str,
    map_id: i64,
    level_refer: i64,
) -> Result<Game> {
    let now = Utc::now().naive_utc();
    let sql = format!(
        "INSERT INTO games (creator_refer, opponent_refer, state_creator, state_opponent, from_friend_request, game_type, map_id, level_refer, created_at, updated_at) VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8, ?8) RETURNING {GAME_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![
            creator_refer,
            opponent_refer,
            SideState::Pending,
            from_friend_request,
            game_type,
            map_id,
            level_refer,
            now
        ],
        parse_game_row,
    )
    .context("Failed to insert game")
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Game>> {
    let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1 AND deleted_at IS NULL");

    conn.query_row(&sql, params![id], parse_game_row)
        .optional()
        .context("Failed to find game by id")
}

/// Open challenges someone else created: no opponent bound yet, creator side
/// still pending. Oldest first, so long-waiting challenges are served before
/// fresh ones.
pub fn list_open_candidates(conn: &Connection, excluding_user: i64) -> Result<Vec<Game>> {
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE opponent_refer IS NULL AND completed = 0 AND state_creator = ?1 AND deleted_at IS NULL AND creator_refer != ?2 ORDER BY created_at ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![SideState::Pending, excluding_user], parse_game_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// The user's most recent completed matchmade game, used to avoid pairing the
/// same two players twice in a row. Friend challenges do not count.
pub fn latest_completed_regular(conn: &Connection, user_id: i64) -> Result<Option<Game>> {
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE (creator_refer = ?1 OR opponent_refer = ?1) AND from_friend_request = 0 AND completed = 1 AND deleted_at IS NULL ORDER BY updated_at DESC LIMIT 1"
    );

    conn.query_row(&sql, params![user_id], parse_game_row)
        .optional()
        .context("Failed to find latest completed game")
}

pub fn has_uncompleted_between(conn: &Connection, user_a: i64, user_b: i64) -> Result<bool> {
    let sql = "SELECT COUNT(*) FROM games WHERE completed = 0 AND deleted_at IS NULL AND ((creator_refer = ?1 AND opponent_refer = ?2) OR (creator_refer = ?2 AND opponent_refer = ?1))";

    let count: i64 = conn
        .query_row(sql, params![user_a, user_b], |row| row.get(0))
        .context("Failed to count uncompleted games between users")?;

    Ok(count > 0)
}

/// Claims the opponent seat. Returns false when another player got there
/// first or the game is no longer open.
pub fn bind_opponent(conn: &Connection, game_id: i64, opponent_id: i64) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let rows = conn
        .execute(
            "UPDATE games SET opponent_refer = ?2, updated_at = ?3 WHERE id = ?1 AND opponent_refer IS NULL AND completed = 0 AND deleted_at IS NULL",
            params![game_id, opponent_id, now],
        )
        .context("Failed to bind opponent")?;

    Ok(rows > 0)
}

/// Flips one side from pending to started and stamps its start time.
/// Returns false when the side is not pending anymore.
pub fn mark_side_started(
    conn: &Connection,
    game_id: i64,
    side: Side,
    accept_friend_request: bool,
) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let (state_col, time_col) = side_columns(side);

    let mut sql =
        format!("UPDATE games SET {state_col} = ?2, {time_col} = ?3, updated_at = ?3");
    if accept_friend_request {
        sql.push_str(", friend_request_accepted = 1, friend_request_accepted_time = ?3");
    }
    sql.push_str(&format!(
        " WHERE id = ?1 AND {state_col} = ?4 AND completed = 0 AND deleted_at IS NULL"
    ));

    let rows = conn
        .execute(
            &sql,
            params![game_id, SideState::Started, now, SideState::Pending],
        )
        .context("Failed to mark game side started")?;

    Ok(rows > 0)
}

/// Records one side's final score and flips the side to completed. Returns
/// false when the side was not in the started state.
pub fn record_side_score(conn: &Connection, game_id: i64, side: Side, score: i64) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let (state_col, _) = side_columns(side);
    let score_col = match side {
        Side::Creator => "score_creator",
        Side::Opponent => "score_opponent",
    };

    let sql = format!(
        "UPDATE games SET {state_col} = ?2, {score_col} = ?3, updated_at = ?4 WHERE id = ?1 AND {state_col} = ?5 AND completed = 0 AND deleted_at IS NULL"
    );

    let rows = conn
        .execute(
            &sql,
            params![game_id, SideState::Completed, score, now, SideState::Started],
        )
        .context("Failed to record game side score")?;

    Ok(rows > 0)
}

/// Writes the settled outcome in one shot. The guard on `completed` makes
/// settlement first-writer-wins when a sweep and a report race.
pub fn finalize_game(conn: &Connection, game: &Game, auto_completed: bool) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let rows = conn
        .execute(
            "UPDATE games SET state_creator = ?2, state_opponent = ?3, score_creator = ?4, score_opponent = ?5, won_refer = ?6, lost_refer = ?7, completed = 1, auto_completed = ?8, updated_at = ?9 WHERE id = ?1 AND completed = 0",
            params![
                game.id,
                game.state_creator,
                game.state_opponent,
                game.score_creator,
                game.score_opponent,
                game.won_refer,
                game.lost_refer,
                auto_completed,
                now
            ],
        )
        .context("Failed to finalize game")?;

    Ok(rows > 0)
}

/// Closes a stale game that never attracted an opponent, charging the loss to
/// the creator who walked away from it.
pub fn force_lose_unattended(conn: &Connection, game_id: i64) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let rows = conn
        .execute(
            "UPDATE games SET lost_refer = creator_refer, completed = 1, auto_completed = 1, updated_at = ?2 WHERE id = ?1 AND completed = 0",
            params![game_id, now],
        )
        .context("Failed to mark unattended game lost")?;

    Ok(rows > 0)
}

/// Games where one side sits in the started state past `deadline`.
pub fn list_stale_started(
    conn: &Connection,
    side: Side,
    deadline: NaiveDateTime,
) -> Result<Vec<Game>> {
    let (state_col, time_col) = side_columns(side);
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE {state_col} = ?1 AND {time_col} <= ?2 AND completed = 0 AND deleted_at IS NULL ORDER BY {time_col} ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![SideState::Started, deadline], parse_game_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Soft-deletes open challenges nobody answered, limited to games created
/// inside the given window.
pub fn soft_delete_unanswered(
    conn: &Connection,
    created_from: NaiveDateTime,
    created_to: NaiveDateTime,
) -> Result<usize> {
    let now = Utc::now().naive_utc();
    conn.execute(
        "UPDATE games SET deleted_at = ?3, updated_at = ?3 WHERE opponent_refer IS NULL AND completed = 0 AND state_creator != ?4 AND deleted_at IS NULL AND created_at >= ?1 AND created_at <= ?2",
        params![created_from, created_to, now, SideState::Started],
    )
    .context("Failed to soft delete unanswered games")
}

/// Games waiting on the given user: the other side already finished, the
/// user's side has not, and the game is still open.
pub fn list_awaiting_action(conn: &Connection, user_id: i64) -> Result<Vec<Game>> {
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE completed = 0 AND deleted_at IS NULL AND ((opponent_refer = ?1 AND state_creator = ?2 AND state_opponent != ?2) OR (creator_refer = ?1 AND state_opponent = ?2 AND state_creator != ?2)) ORDER BY updated_at DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, SideState::Completed], parse_game_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Games where the user's own side is finished, newest activity first.
pub fn list_history(conn: &Connection, user_id: i64) -> Result<Vec<Game>> {
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE deleted_at IS NULL AND ((creator_refer = ?1 AND state_creator = ?2) OR (opponent_refer = ?1 AND state_opponent = ?2)) ORDER BY updated_at DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, SideState::Completed], parse_game_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Completed games between two specific users, newest first.
pub fn list_history_between(conn: &Connection, user_a: i64, user_b: i64) -> Result<Vec<Game>> {
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE completed = 1 AND deleted_at IS NULL AND ((creator_refer = ?1 AND opponent_refer = ?2) OR (creator_refer = ?2 AND opponent_refer = ?1)) ORDER BY updated_at DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_a, user_b], parse_game_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Hard-deletes open games between two users. Used when a friendship ends.
pub fn delete_uncompleted_between(conn: &Connection, user_a: i64, user_b: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM games WHERE completed = 0 AND ((creator_refer = ?1 AND opponent_refer = ?2) OR (creator_refer = ?2 AND opponent_refer = ?1))",
        params![user_a, user_b],
    )
    .context("Failed to delete uncompleted games between users")
}

fn side_columns(side: Side) -> (&'static str, &'static str) {
    match side {
        Side::Creator => ("state_creator", "start_time_creator"),
        Side::Opponent => ("state_opponent", "start_time_opponent"),
    }
}

fn parse_game_row(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        creator_refer: row.get(1)?,
        opponent_refer: row.get(2)?,
        won_refer: row.get(3)?,
        lost_refer: row.get(4)?,
        state_creator: row.get(5)?,
        state_opponent: row.get(6)?,
        score_creator: row.get(7)?,
        score_opponent: row.get(8)?,
        start_time_creator: row.get(9)?,
        start_time_opponent: row.get(10)?,
        from_friend_request: row.get(11)?,
        friend_request_accepted: row.get(12)?,
        friend_request_accepted_time: row.get(13)?,
        game_type: row.get(14)?,
        map_id: row.get(15)?,
        level_refer: row.get(16)?,
        completed: row.get(17)?,
        auto_completed: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
        deleted_at: row.get(21)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::create_memory_pool;
    use crate::database::setup::initialize_database;
    use crate::database::DbPool;

    fn setup() -> DbPool {
        let pool = create_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        initialize_database(&conn).unwrap();
        pool
    }

    #[test]
    fn test_insert_and_find_roundtrip() {
        let pool = setup();
        let conn = pool.get().unwrap();

        let game = insert_game(&conn, 1, None, false, "time", 7, 1).unwrap();
        assert_eq!(game.state_creator, SideState::Pending);
        assert_eq!(game.state_opponent, SideState::Pending);
        assert!(!game.completed);
        assert_eq!(game.opponent_refer, None);

        let found = find_by_id(&conn, game.id).unwrap().unwrap();
        assert_eq!(found.creator_refer, 1);
        assert_eq!(found.game_type, "time");
        assert_eq!(found.map_id, 7);
    }

    #[test]
    fn test_bind_opponent_is_first_writer_wins() {
        let pool = setup();
        let conn = pool.get().unwrap();

        let game = insert_game(&conn, 1, None, false, "points", 3, 1).unwrap();
        assert!(bind_opponent(&conn, game.id, 2).unwrap());
        assert!(!bind_opponent(&conn, game.id, 3).unwrap());

        let found = find_by_id(&conn, game.id).unwrap().unwrap();
        assert_eq!(found.opponent_refer, Some(2));
    }

    #[test]
    fn test_side_transitions_are_guarded() {
        let pool = setup();
        let conn = pool.get().unwrap();

        let game = insert_game(&conn, 1, Some(2), true, "time", 0, 1).unwrap();

        // Cannot report a score before starting.
        assert!(!record_side_score(&conn, game.id, Side::Creator, 5).unwrap());

        assert!(mark_side_started(&conn, game.id, Side::Creator, false).unwrap());
        assert!(!mark_side_started(&conn, game.id, Side::Creator, false).unwrap());

        assert!(record_side_score(&conn, game.id, Side::Creator, 5).unwrap());
        assert!(!record_side_score(&conn, game.id, Side::Creator, 9).unwrap());

        let found = find_by_id(&conn, game.id).unwrap().unwrap();
        assert_eq!(found.state_creator, SideState::Completed);
        assert_eq!(found.score_creator, 5);
        assert!(found.start_time_creator.is_some());
        assert_eq!(found.state_opponent, SideState::Pending);
    }

    #[test]
    fn test_open_candidates_exclude_own_and_started() {
        let pool = setup();
        let conn = pool.get().unwrap();

        let own = insert_game(&conn, 1, None, false, "time", 0, 1).unwrap();
        let other = insert_game(&conn, 2, None, false, "time", 0, 1).unwrap();
        let started = insert_game(&conn, 3, None, false, "time", 0, 1).unwrap();
        mark_side_started(&conn, started.id, Side::Creator, false).unwrap();

        let candidates = list_open_candidates(&conn, 1).unwrap();
        let ids: Vec<i64> = candidates.iter().map(|g| g.id).collect();
        assert!(ids.contains(&other.id));
        assert!(!ids.contains(&own.id));
        assert!(!ids.contains(&started.id));
    }
}
