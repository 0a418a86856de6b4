use anyhow::anyhow;
use rusqlite::Connection;

use super::MatchEngine;
use crate::config::EngineSettings;
use crate::database::{self, games, levels, users, Game};
use crate::errors::GameError;

impl MatchEngine {
    /// The oldest open challenge the requester may fairly join, or
    /// [`GameError::NoMatchingGame`] when nothing qualifies.
    pub fn find_open_match(&self, requester_id: i64) -> Result<Game, GameError> {
        let conn = database::get_connection(&self.pool)?;
        find_candidate(&conn, &self.settings, requester_id)
    }
}

/// Candidate selection, oldest challenge first. A candidate is rejected when
/// it would repeat the requester's most recent matchmade pairing, or when the
/// creator's level band at creation time is more than one band away from the
/// requester's current band.
pub(super) fn find_candidate(
    conn: &Connection,
    settings: &EngineSettings,
    requester_id: i64,
) -> Result<Game, GameError> {
    let requester = users::find_by_id(conn, requester_id)?.ok_or(GameError::UserNotFound)?;
    let requester_level = levels::find_by_id(conn, requester.level_refer)?
        .ok_or_else(|| anyhow!("level {} missing for user {}", requester.level_refer, requester.id))?;

    let previous = games::latest_completed_regular(conn, requester_id)?;
    let candidates = games::list_open_candidates(conn, requester_id)?;

    for candidate in candidates {
        if let Some(previous) = &previous {
            if shares_participant(previous, &candidate) {
                continue;
            }
        }

        let candidate_level = match levels::find_by_id(conn, candidate.level_refer)? {
            Some(level) => level,
            None => continue,
        };
        let gap = (candidate_level.order_index - requester_level.order_index).abs();
        if gap > settings.max_level_order_gap {
            continue;
        }

        return Ok(candidate);
    }

    Err(GameError::NoMatchingGame)
}

fn participants(game: &Game) -> [Option<i64>; 2] {
    [Some(game.creator_refer), game.opponent_refer]
}

/// True when any player sits in both games.
fn shares_participant(a: &Game, b: &Game) -> bool {
    participants(a)
        .iter()
        .flatten()
        .any(|id| participants(b).iter().flatten().any(|other| other == id))
}
