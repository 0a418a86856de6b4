use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};

use super::{matchmaking, MatchEngine};
use crate::config::EngineSettings;
use crate::database::{self, games, users, Game, Side, SideState, User};
use crate::errors::GameError;
use crate::notify::NotificationKind;

/// Pushes collected during a transaction and sent only after it commits.
type Pushes = Vec<(NotificationKind, i64)>;

impl MatchEngine {
    /// Opens a match for the user. Without a challenged friend this first
    /// tries to claim an open challenge from matchmaking; only when none
    /// qualifies (or the claim is raced away) does it open a fresh one with
    /// random parameters.
    pub fn create(&self, creator_id: i64, friend_id: Option<i64>) -> Result<Game, GameError> {
        let conn = database::get_connection(&self.pool)?;

        let creator = users::find_by_id(&conn, creator_id)?.ok_or(GameError::UserNotFound)?;

        if friend_id.is_none() {
            match matchmaking::find_candidate(&conn, &self.settings, creator_id) {
                Ok(candidate) => {
                    if games::bind_opponent(&conn, candidate.id, creator_id)? {
                        let game = games::find_by_id(&conn, candidate.id)?
                            .ok_or(GameError::GameNotFound)?;
                        info!(
                            "user {} joined open game {} from user {}",
                            creator_id, game.id, game.creator_refer
                        );
                        return Ok(game);
                    }
                }
                Err(GameError::NoMatchingGame) => {}
                Err(err) => return Err(err),
            }
        }

        if let Some(friend_id) = friend_id {
            let opponent =
                users::find_by_id(&conn, friend_id)?.ok_or(GameError::OpponentNotFound)?;
            if games::has_uncompleted_between(&conn, creator_id, opponent.id)? {
                return Err(GameError::GameAlreadyOpen);
            }
        }

        let (game_type, map_id) = {
            let mut rng = rand::thread_rng();
            let game_type = self
                .settings
                .game_types
                .choose(&mut rng)
                .copied()
                .unwrap_or("time");
            (game_type, rng.gen_range(0..self.settings.map_id_range))
        };

        let game = games::insert_game(
            &conn,
            creator_id,
            friend_id,
            friend_id.is_some(),
            game_type,
            map_id,
            creator.level_refer,
        )?;
        info!(
            "user {} opened game {} ({}, map {})",
            creator_id, game.id, game.game_type, game.map_id
        );

        Ok(game)
    }

    /// Marks the caller's side as started. For the challenged side of a
    /// friend game this is also the moment the challenge counts as accepted.
    pub fn start(&self, game_id: i64, user_id: i64) -> Result<Game, GameError> {
        let conn = database::get_connection(&self.pool)?;

        let game = games::find_by_id(&conn, game_id)?.ok_or(GameError::GameNotFound)?;
        let side = game.side_of(user_id).ok_or(GameError::GameNotRelated)?;

        if game.state_of(side) != SideState::Pending {
            return Err(GameError::GameNotPending);
        }

        let accept =
            side == Side::Opponent && game.from_friend_request && !game.friend_request_accepted;

        if !games::mark_side_started(&conn, game_id, side, accept)? {
            return Err(GameError::GameNotPending);
        }

        let game = games::find_by_id(&conn, game_id)?.ok_or(GameError::GameNotFound)?;
        Ok(game)
    }

    /// Records the caller's final score. When this was the last outstanding
    /// side, the game settles in the same transaction; otherwise the other
    /// player is poked to come play theirs.
    pub fn result(&self, game_id: i64, user_id: i64, score: i64) -> Result<Game, GameError> {
        if score < 1 {
            return Err(GameError::Validation("game_score_invalid"));
        }

        let mut conn = database::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let game = games::find_by_id(&tx, game_id)?.ok_or(GameError::GameNotFound)?;
        let side = game.side_of(user_id).ok_or(GameError::GameNotRelated)?;

        match game.state_of(side) {
            SideState::Started => {}
            SideState::Completed => return Err(GameError::ScoreAlreadySaved),
            SideState::Pending | SideState::Aborted => return Err(GameError::GameNotStarted),
        }

        if !games::record_side_score(&tx, game_id, side, score)? {
            return Err(GameError::GameNotStarted);
        }

        let mut game = games::find_by_id(&tx, game_id)?.ok_or(GameError::GameNotFound)?;

        let mut pushes = Pushes::new();
        let other = side.other();
        match game.user_of(other) {
            Some(_) if game.state_of(other) == SideState::Completed => {
                pushes = self.complete(&tx, &mut game, false)?;
            }
            Some(other_id) => {
                // The other player now has a result to answer.
                pushes.push((NotificationKind::ChallengeReceived, other_id));
            }
            None => {}
        }

        tx.commit()?;
        self.send_pushes(pushes);

        Ok(game)
    }

    /// Settles a game whose sides are all final: applies score rewards to
    /// both players, marks winner and loser, and closes the row. Runs inside
    /// the caller's transaction; the returned pushes must be sent only after
    /// it commits.
    pub(super) fn complete(
        &self,
        conn: &Connection,
        game: &mut Game,
        auto_completed: bool,
    ) -> Result<Pushes, GameError> {
        let opponent_id = game.opponent_refer.ok_or(GameError::GameNotCompleted)?;
        for side in [Side::Creator, Side::Opponent] {
            match game.state_of(side) {
                SideState::Completed | SideState::Aborted => {}
                SideState::Pending | SideState::Started => {
                    return Err(GameError::GameNotCompleted)
                }
            }
        }

        let mut creator =
            users::find_by_id(conn, game.creator_refer)?.ok_or(GameError::UserNotFound)?;
        let mut opponent = users::find_by_id(conn, opponent_id)?.ok_or(GameError::UserNotFound)?;

        let pushes = reward_points(&self.settings, game, &mut creator, &mut opponent);

        users::save(conn, &mut creator)?;
        users::save(conn, &mut opponent)?;

        if !games::finalize_game(conn, game, auto_completed)? {
            return Err(GameError::GameNotCompleted);
        }
        game.completed = true;
        game.auto_completed = auto_completed;

        info!(
            "game {} completed: {} vs {} ({}:{}){}",
            game.id,
            creator.username,
            opponent.username,
            game.score_creator,
            game.score_opponent,
            if auto_completed { " [swept]" } else { "" }
        );

        Ok(pushes)
    }

    pub(super) fn send_pushes(&self, pushes: Pushes) {
        for (kind, recipient) in pushes {
            self.notifier.notify(kind, recipient, None);
        }
    }
}

/// The reward matrix. The higher reported score wins: the winner takes the
/// full bonus and a win on their record, the loser pays the penalty but never
/// drops below zero. A loser whose side was aborted by the sweep gets half
/// the bonus back as consolation, applied after the floor. Draws move no
/// points. Both players' played counters always advance.
fn reward_points(
    settings: &EngineSettings,
    game: &mut Game,
    creator: &mut User,
    opponent: &mut User,
) -> Pushes {
    creator.games_played_count += 1;
    opponent.games_played_count += 1;

    let winner_side = if game.score_creator > game.score_opponent {
        Side::Creator
    } else if game.score_opponent > game.score_creator {
        Side::Opponent
    } else {
        return Pushes::new();
    };

    let (winner, loser) = match winner_side {
        Side::Creator => (&mut *creator, &mut *opponent),
        Side::Opponent => (&mut *opponent, &mut *creator),
    };

    winner.score += settings.win_score_bonus;
    winner.games_won_count += 1;
    loser.score = (loser.score - settings.loss_score_penalty).max(0);

    if game.state_of(winner_side.other()) == SideState::Aborted {
        loser.score += settings.abort_consolation();
    }

    game.won_refer = Some(winner.id);
    game.lost_refer = Some(loser.id);

    vec![
        (NotificationKind::GameWon, winner.id),
        (NotificationKind::GameLost, loser.id),
    ]
}
