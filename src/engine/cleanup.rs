use chrono::{Duration, Utc};
use log::{info, warn};
use rusqlite::TransactionBehavior;

use super::MatchEngine;
use crate::database::{self, games, lives, users, Side, SideState};
use crate::errors::GameError;

/// What one sweep did, mostly for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub unanswered_removed: usize,
    pub forced_completions: usize,
    pub forfeits: usize,
    pub expired_life_requests: usize,
}

enum StaleOutcome {
    Forced,
    Forfeited,
    Skipped,
}

impl MatchEngine {
    /// One full maintenance sweep:
    ///
    /// 1. soft-deletes open challenges nobody answered within a day (but not
    ///    ones old enough to have fallen out of the window),
    /// 2. closes games where a side has been sitting in the started state for
    ///    too long, forcing a win for the side that showed up,
    /// 3. drops life requests that went unanswered for a day.
    ///
    /// Every stale game is settled in its own transaction, and a failure on
    /// one game never stops the rest of the sweep.
    pub fn cleanup_sweep(&self) -> Result<CleanupStats, GameError> {
        let mut stats = CleanupStats::default();
        let now = Utc::now().naive_utc();

        {
            let conn = database::get_connection(&self.pool)?;

            let window_from = now - Duration::hours(self.settings.unanswered_before_hours);
            let window_to = now - Duration::hours(self.settings.unanswered_after_hours);
            stats.unanswered_removed =
                games::soft_delete_unanswered(&conn, window_from, window_to)?;

            let cutoff = now - Duration::hours(self.settings.life_request_expiry_hours);
            stats.expired_life_requests = lives::delete_expired_unapproved(&conn, cutoff)?;
        }

        let deadline = now - Duration::minutes(self.settings.stale_start_minutes);
        for side in [Side::Creator, Side::Opponent] {
            let stale = {
                let conn = database::get_connection(&self.pool)?;
                games::list_stale_started(&conn, side, deadline)?
            };
            for game in stale {
                match self.close_stale(game.id, side) {
                    Ok(StaleOutcome::Forced) => stats.forced_completions += 1,
                    Ok(StaleOutcome::Forfeited) => stats.forfeits += 1,
                    Ok(StaleOutcome::Skipped) => {}
                    Err(err) => warn!("cleanup of game {} failed: {err:#}", game.id),
                }
            }
        }

        if stats != CleanupStats::default() {
            info!(
                "cleanup sweep: {} unanswered removed, {} forced completions, {} forfeits, {} life requests expired",
                stats.unanswered_removed,
                stats.forced_completions,
                stats.forfeits,
                stats.expired_life_requests
            );
        }

        Ok(stats)
    }

    /// Closes one stale game. With no opponent bound the creator simply
    /// forfeits; with two players the side that showed up gets a forced win
    /// and the side that never finished is marked aborted.
    fn close_stale(&self, game_id: i64, stale_side: Side) -> Result<StaleOutcome, GameError> {
        let mut conn = database::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut game) = games::find_by_id(&tx, game_id)? else {
            return Ok(StaleOutcome::Skipped);
        };
        // Re-check under the transaction; the player may have reported since
        // the game was listed.
        if game.completed || game.state_of(stale_side) != SideState::Started {
            return Ok(StaleOutcome::Skipped);
        }

        if game.opponent_refer.is_none() {
            let mut creator =
                users::find_by_id(&tx, game.creator_refer)?.ok_or(GameError::UserNotFound)?;
            creator.score = (creator.score - self.settings.loss_score_penalty).max(0);
            creator.games_played_count += 1;
            users::save(&tx, &mut creator)?;

            if !games::force_lose_unattended(&tx, game.id)? {
                return Ok(StaleOutcome::Skipped);
            }
            tx.commit()?;
            info!(
                "game {} forfeited: {} started it and walked away",
                game.id, creator.username
            );
            return Ok(StaleOutcome::Forfeited);
        }

        game.set_score(stale_side, self.settings.forced_winner_score);
        game.set_score(stale_side.other(), self.settings.forced_loser_score);
        game.set_state(stale_side, SideState::Completed);
        if game.state_of(stale_side.other()) != SideState::Completed {
            game.set_state(stale_side.other(), SideState::Aborted);
        }

        let pushes = self.complete(&tx, &mut game, true)?;
        tx.commit()?;
        self.send_pushes(pushes);

        Ok(StaleOutcome::Forced)
    }
}
