use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;

/// Per-side progress of a match. The numeric values are part of the wire
/// format and of the stored rows, so they must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideState {
    Completed = 0,
    Pending = 1,
    Aborted = 2,
    Started = 3,
}

impl SideState {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl ToSql for SideState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

impl FromSql for SideState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            0 => Ok(SideState::Completed),
            1 => Ok(SideState::Pending),
            2 => Ok(SideState::Aborted),
            3 => Ok(SideState::Started),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

/// Which seat of a match a user occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Creator,
    Opponent,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Creator => Side::Opponent,
            Side::Opponent => Side::Creator,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub language: String,
    pub guest: bool,
    pub avatar: i64,
    pub is_verified: bool,
    pub score: i64,
    pub games_played_count: i64,
    pub games_won_count: i64,
    pub level: String,
    pub level_refer: i64,
    pub top_level: String,
    pub top_level_refer: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Level {
    pub id: i64,
    pub name: String,
    pub from_score: i64,
    pub to_score: i64,
    pub order_index: i64,
}

#[derive(Debug, Clone)]
pub struct Game {
    pub id: i64,
    pub creator_refer: i64,
    pub opponent_refer: Option<i64>,
    pub won_refer: Option<i64>,
    pub lost_refer: Option<i64>,
    pub state_creator: SideState,
    pub state_opponent: SideState,
    pub score_creator: i64,
    pub score_opponent: i64,
    pub start_time_creator: Option<NaiveDateTime>,
    pub start_time_opponent: Option<NaiveDateTime>,
    pub from_friend_request: bool,
    pub friend_request_accepted: bool,
    pub friend_request_accepted_time: Option<NaiveDateTime>,
    pub game_type: String,
    pub map_id: i64,
    pub level_refer: i64,
    pub completed: bool,
    pub auto_completed: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Game {
    /// The seat `user_id` occupies in this game, if any.
    pub fn side_of(&self, user_id: i64) -> Option<Side> {
        if self.creator_refer == user_id {
            Some(Side::Creator)
        } else if self.opponent_refer == Some(user_id) {
            Some(Side::Opponent)
        } else {
            None
        }
    }

    pub fn state_of(&self, side: Side) -> SideState {
        match side {
            Side::Creator => self.state_creator,
            Side::Opponent => self.state_opponent,
        }
    }

    pub fn score_of(&self, side: Side) -> i64 {
        match side {
            Side::Creator => self.score_creator,
            Side::Opponent => self.score_opponent,
        }
    }

    pub fn user_of(&self, side: Side) -> Option<i64> {
        match side {
            Side::Creator => Some(self.creator_refer),
            Side::Opponent => self.opponent_refer,
        }
    }

    pub fn set_state(&mut self, side: Side, state: SideState) {
        match side {
            Side::Creator => self.state_creator = state,
            Side::Opponent => self.state_opponent = state,
        }
    }

    pub fn set_score(&mut self, side: Side, score: i64) {
        match side {
            Side::Creator => self.score_creator = score,
            Side::Opponent => self.score_opponent = score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Friend {
    pub id: i64,
    pub requester_refer: i64,
    pub receiver_refer: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct FriendRequest {
    pub id: i64,
    pub requester_refer: i64,
    pub receiver_refer: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct PushToken {
    pub id: i64,
    pub user_refer: i64,
    pub token: String,
    pub platform: String,
}

#[derive(Debug, Clone)]
pub struct LifeRequest {
    pub id: i64,
    pub requester_refer: i64,
    pub receiver_refer: i64,
    pub approved: bool,
    pub collected: bool,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_of_resolves_both_seats() {
        let game = Game {
            id: 1,
            creator_refer: 10,
            opponent_refer: Some(20),
            won_refer: None,
            lost_refer: None,
            state_creator: SideState::Pending,
            state_opponent: SideState::Pending,
            score_creator: 0,
            score_opponent: 0,
            start_time_creator: None,
            start_time_opponent: None,
            from_friend_request: false,
            friend_request_accepted: false,
            friend_request_accepted_time: None,
            game_type: "time".to_string(),
            map_id: 0,
            level_refer: 1,
            completed: false,
            auto_completed: false,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
            deleted_at: None,
        };

        assert_eq!(game.side_of(10), Some(Side::Creator));
        assert_eq!(game.side_of(20), Some(Side::Opponent));
        assert_eq!(game.side_of(30), None);
        assert_eq!(Side::Creator.other(), Side::Opponent);
    }

    #[test]
    fn test_side_state_wire_values() {
        assert_eq!(SideState::Completed.as_i64(), 0);
        assert_eq!(SideState::Pending.as_i64(), 1);
        assert_eq!(SideState::Aborted.as_i64(), 2);
        assert_eq!(SideState::Started.as_i64(), 3);
    }
}
