//! End-to-end match flows driven through the public [`MatchEngine`] API:
//! pairing, settlement, rewards and the maintenance sweep.

use chrono::{Duration, Utc};
use rusqlite::params;
use tokio::sync::mpsc::UnboundedReceiver;

use dropclash_backend::config::EngineSettings;
use dropclash_backend::database::connection::create_memory_pool;
use dropclash_backend::database::setup::initialize_database;
use dropclash_backend::database::{games, levels, users, DbPool, Game, Side, SideState, User};
use dropclash_backend::engine::MatchEngine;
use dropclash_backend::errors::GameError;
use dropclash_backend::notify::{Notification, NotificationKind, Notifier};

fn setup() -> (MatchEngine, DbPool, UnboundedReceiver<Notification>) {
    let pool = create_memory_pool().unwrap();
    {
        let conn = pool.get().unwrap();
        initialize_database(&conn).unwrap();
        levels::seed_levels(&conn).unwrap();
    }
    let (notifier, rx) = Notifier::channel();
    let engine = MatchEngine::new(pool.clone(), EngineSettings::default(), notifier);
    (engine, pool, rx)
}

fn make_user(pool: &DbPool, name: &str, score: i64) -> User {
    let conn = pool.get().unwrap();
    users::insert_user(&conn, name, None, "en_US", true, score).unwrap()
}

fn get_user(pool: &DbPool, id: i64) -> User {
    let conn = pool.get().unwrap();
    users::find_by_id(&conn, id).unwrap().unwrap()
}

fn get_game(pool: &DbPool, id: i64) -> Game {
    let conn = pool.get().unwrap();
    games::find_by_id(&conn, id).unwrap().unwrap()
}

fn count_games(pool: &DbPool) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))
        .unwrap()
}

fn backdate_start(pool: &DbPool, game_id: i64, side: Side, minutes: i64) {
    let conn = pool.get().unwrap();
    let then = Utc::now().naive_utc() - Duration::minutes(minutes);
    let column = match side {
        Side::Creator => "start_time_creator",
        Side::Opponent => "start_time_opponent",
    };
    conn.execute(
        &format!("UPDATE games SET {column} = ?2 WHERE id = ?1"),
        params![game_id, then],
    )
    .unwrap();
}

/// Start the caller's side and report a score for it in one go.
fn play_side(engine: &MatchEngine, game_id: i64, user_id: i64, score: i64) -> Game {
    engine.start(game_id, user_id).unwrap();
    engine.result(game_id, user_id, score).unwrap()
}

fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<(NotificationKind, i64)> {
    let mut out = Vec::new();
    while let Ok(note) = rx.try_recv() {
        out.push((note.kind, note.recipient));
    }
    out
}

#[test]
fn test_create_with_nobody_waiting_opens_a_fresh_challenge() {
    let (engine, pool, _rx) = setup();
    let ada = make_user(&pool, "ada", 100);

    let game = engine.create(ada.id, None).unwrap();

    assert_eq!(game.creator_refer, ada.id);
    assert_eq!(game.opponent_refer, None);
    assert_eq!(game.state_creator, SideState::Pending);
    assert_eq!(game.state_opponent, SideState::Pending);
    assert!(!game.completed);
    assert!(!game.from_friend_request);

    let settings = EngineSettings::default();
    assert!(settings.game_types.contains(&game.game_type.as_str()));
    assert!((0..settings.map_id_range).contains(&game.map_id));
}

#[test]
fn test_create_claims_an_open_challenge_one_band_away() {
    let (engine, pool, _rx) = setup();
    // Novice and Greenhorn sit in adjacent level bands.
    let host = make_user(&pool, "host", 100);
    let joiner = make_user(&pool, "joiner", 450);

    let open = engine.create(host.id, None).unwrap();
    let joined = engine.create(joiner.id, None).unwrap();

    assert_eq!(joined.id, open.id);
    assert_eq!(joined.creator_refer, host.id);
    assert_eq!(joined.opponent_refer, Some(joiner.id));
    assert_eq!(joined.state_creator, SideState::Pending);
    assert_eq!(joined.state_opponent, SideState::Pending);
    // Joining claims the existing row instead of opening a second one.
    assert_eq!(count_games(&pool), 1);
}

#[test]
fn test_both_reports_settle_the_game_and_move_points() {
    let (engine, pool, mut rx) = setup();
    let creator = make_user(&pool, "creator", 100);
    let opponent = make_user(&pool, "opponent", 100);

    let game = engine.create(creator.id, None).unwrap();
    engine.create(opponent.id, None).unwrap();

    play_side(&engine, game.id, creator.id, 5);
    // The waiting side is poked to come play.
    assert_eq!(
        drain(&mut rx),
        vec![(NotificationKind::ChallengeReceived, opponent.id)]
    );

    let settled = play_side(&engine, game.id, opponent.id, 3);
    assert!(settled.completed);
    assert!(!settled.auto_completed);
    assert_eq!(settled.won_refer, Some(creator.id));
    assert_eq!(settled.lost_refer, Some(opponent.id));

    let creator = get_user(&pool, creator.id);
    let opponent = get_user(&pool, opponent.id);
    assert_eq!(creator.score, 120);
    assert_eq!(opponent.score, 90);
    assert_eq!(creator.games_played_count, 1);
    assert_eq!(opponent.games_played_count, 1);
    assert_eq!(creator.games_won_count, 1);
    assert_eq!(opponent.games_won_count, 0);

    let notes = drain(&mut rx);
    assert!(notes.contains(&(NotificationKind::GameWon, creator.id)));
    assert!(notes.contains(&(NotificationKind::GameLost, opponent.id)));
}

#[test]
fn test_settled_games_carry_final_sides_and_one_verdict() {
    let (engine, pool, _rx) = setup();
    let a = make_user(&pool, "a", 100);
    let b = make_user(&pool, "b", 100);
    let c = make_user(&pool, "c", 100);
    let d = make_user(&pool, "d", 100);

    let won = engine.create(a.id, None).unwrap();
    engine.create(b.id, None).unwrap();
    play_side(&engine, won.id, a.id, 8);
    play_side(&engine, won.id, b.id, 2);

    let drawn = engine.create(c.id, None).unwrap();
    engine.create(d.id, None).unwrap();
    play_side(&engine, drawn.id, c.id, 4);
    play_side(&engine, drawn.id, d.id, 4);

    for id in [won.id, drawn.id] {
        let game = get_game(&pool, id);
        assert!(game.completed);
        assert_eq!(game.state_creator, SideState::Completed);
        assert_eq!(game.state_opponent, SideState::Completed);
        // A settled game names a winner and a loser, or neither.
        assert_eq!(game.won_refer.is_some(), game.lost_refer.is_some());
    }

    assert!(get_game(&pool, won.id).won_refer.is_some());
    assert!(get_game(&pool, drawn.id).won_refer.is_none());
}

#[test]
fn test_reporting_the_same_side_twice_is_rejected() {
    let (engine, pool, _rx) = setup();
    let a = make_user(&pool, "a", 100);
    let b = make_user(&pool, "b", 100);

    let game = engine.create(a.id, None).unwrap();
    engine.create(b.id, None).unwrap();

    play_side(&engine, game.id, a.id, 5);
    let err = engine.result(game.id, a.id, 7).unwrap_err();
    assert_eq!(err.key(), "score_already_saved");

    // Still rejected after the game settles.
    play_side(&engine, game.id, b.id, 3);
    let err = engine.result(game.id, b.id, 9).unwrap_err();
    assert_eq!(err.key(), "score_already_saved");

    // The first report stands.
    assert_eq!(get_game(&pool, game.id).score_creator, 5);
}

#[test]
fn test_matchmaking_never_crosses_more_than_one_level_band() {
    let (engine, pool, _rx) = setup();
    let expert = make_user(&pool, "expert", 900);
    let novice = make_user(&pool, "novice", 100);
    let greenhorn = make_user(&pool, "greenhorn", 450);

    let experts_open = engine.create(expert.id, None).unwrap();

    // Two bands apart: the novice gets a fresh game instead.
    let novices_game = engine.create(novice.id, None).unwrap();
    assert_ne!(novices_game.id, experts_open.id);
    assert_eq!(novices_game.creator_refer, novice.id);
    assert_eq!(novices_game.opponent_refer, None);

    // One band apart: the greenhorn claims the expert's challenge, which is
    // also the oldest one waiting.
    let joined = engine.create(greenhorn.id, None).unwrap();
    assert_eq!(joined.id, experts_open.id);
    assert_eq!(joined.opponent_refer, Some(greenhorn.id));
}

#[test]
fn test_matchmaking_avoids_an_immediate_rematch() {
    let (engine, pool, _rx) = setup();
    let alice = make_user(&pool, "alice", 100);
    let bob = make_user(&pool, "bob", 100);
    let carol = make_user(&pool, "carol", 100);

    // Alice and Bob play a matchmade game to the end.
    let played = engine.create(alice.id, None).unwrap();
    engine.create(bob.id, None).unwrap();
    play_side(&engine, played.id, alice.id, 6);
    play_side(&engine, played.id, bob.id, 4);

    // Bob queues again. Alice must not land in the same pairing twice in a
    // row, so her create opens a fresh challenge instead of claiming his.
    let bobs_open = engine.create(bob.id, None).unwrap();
    assert_eq!(bobs_open.opponent_refer, None);

    let alices_game = engine.create(alice.id, None).unwrap();
    assert_ne!(alices_game.id, bobs_open.id);
    assert_eq!(alices_game.creator_refer, alice.id);
    assert_eq!(alices_game.opponent_refer, None);

    // Carol carries no such history and claims Bob's challenge.
    let carols_game = engine.create(carol.id, None).unwrap();
    assert_eq!(carols_game.id, bobs_open.id);
    assert_eq!(carols_game.opponent_refer, Some(carol.id));
}

#[test]
fn test_losing_never_pushes_a_score_below_zero() {
    let (engine, pool, _rx) = setup();
    let rich = make_user(&pool, "rich", 100);
    let broke = make_user(&pool, "broke", 5);

    let game = engine.create(rich.id, None).unwrap();
    engine.create(broke.id, None).unwrap();
    play_side(&engine, game.id, rich.id, 9);
    play_side(&engine, game.id, broke.id, 1);

    assert_eq!(get_user(&pool, broke.id).score, 0);
    assert_eq!(get_user(&pool, rich.id).score, 120);
}

#[test]
fn test_sweep_forces_a_win_for_the_side_that_showed_up() {
    let (engine, pool, mut rx) = setup();
    let alice = make_user(&pool, "alice", 100);
    let bob = make_user(&pool, "bob", 100);

    let game = engine.create(alice.id, None).unwrap();
    engine.create(bob.id, None).unwrap();

    // Alice starts and never reports; eleven minutes later the sweep runs.
    engine.start(game.id, alice.id).unwrap();
    backdate_start(&pool, game.id, Side::Creator, 11);

    let stats = engine.cleanup_sweep().unwrap();
    assert_eq!(stats.forced_completions, 1);
    assert_eq!(stats.forfeits, 0);

    let game = get_game(&pool, game.id);
    assert!(game.completed);
    assert!(game.auto_completed);
    assert_eq!(game.score_creator, 2);
    assert_eq!(game.score_opponent, 1);
    assert_eq!(game.won_refer, Some(alice.id));
    assert_eq!(game.lost_refer, Some(bob.id));

    let notes = drain(&mut rx);
    assert!(notes.contains(&(NotificationKind::GameWon, alice.id)));
    assert!(notes.contains(&(NotificationKind::GameLost, bob.id)));
}

#[test]
fn test_sweep_leaves_fresh_starts_alone() {
    let (engine, pool, _rx) = setup();
    let alice = make_user(&pool, "alice", 100);
    let bob = make_user(&pool, "bob", 100);

    let game = engine.create(alice.id, None).unwrap();
    engine.create(bob.id, None).unwrap();
    engine.start(game.id, alice.id).unwrap();
    backdate_start(&pool, game.id, Side::Creator, 9);

    let stats = engine.cleanup_sweep().unwrap();
    assert_eq!(stats.forced_completions, 0);
    assert!(!get_game(&pool, game.id).completed);
}

#[test]
fn test_create_rejects_a_pair_with_an_open_game() {
    let (engine, pool, _rx) = setup();
    let x = make_user(&pool, "x", 100);
    let y = make_user(&pool, "y", 100);

    // An uncompleted matchmade game already runs between them.
    let open = engine.create(x.id, None).unwrap();
    engine.create(y.id, None).unwrap();
    assert_eq!(get_game(&pool, open.id).opponent_refer, Some(y.id));

    let err = engine.create(x.id, Some(y.id)).unwrap_err();
    assert_eq!(err.key(), "game_already_open");
    let err = engine.create(y.id, Some(x.id)).unwrap_err();
    assert_eq!(err.key(), "game_already_open");

    // The guard is per pair, not global.
    let z = make_user(&pool, "z", 100);
    assert!(engine.create(x.id, Some(z.id)).is_ok());
}

#[test]
fn test_friend_challenge_runs_to_settlement() {
    let (engine, pool, mut rx) = setup();
    let alice = make_user(&pool, "alice", 100);
    let bob = make_user(&pool, "bob", 100);

    let game = engine.create(alice.id, Some(bob.id)).unwrap();
    assert!(game.from_friend_request);
    assert_eq!(game.opponent_refer, Some(bob.id));

    play_side(&engine, game.id, alice.id, 3);
    assert_eq!(
        drain(&mut rx),
        vec![(NotificationKind::ChallengeReceived, bob.id)]
    );

    let settled = play_side(&engine, game.id, bob.id, 7);
    assert!(settled.completed);
    assert!(settled.friend_request_accepted);
    assert_eq!(settled.won_refer, Some(bob.id));
    assert_eq!(get_user(&pool, bob.id).score, 120);
    assert_eq!(get_user(&pool, alice.id).score, 90);
}

#[test]
fn test_matchmade_games_exclude_deleted_challenges() {
    let (engine, pool, _rx) = setup();
    let host = make_user(&pool, "host", 100);
    let joiner = make_user(&pool, "joiner", 100);

    let open = engine.create(host.id, None).unwrap();
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "UPDATE games SET deleted_at = ?2 WHERE id = ?1",
            params![open.id, Utc::now().naive_utc()],
        )
        .unwrap();
    }

    // The removed challenge is invisible; the joiner opens a fresh one.
    let game = engine.create(joiner.id, None).unwrap();
    assert_ne!(game.id, open.id);
    assert_eq!(game.opponent_refer, None);
}
