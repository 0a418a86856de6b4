use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::AppConfig;
use crate::engine::MatchEngine;
use crate::notify::Notifier;

pub mod auth;
pub mod friends;
pub mod games;
pub mod lives;
pub mod profile;
pub mod search;
pub mod statistics;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<SqliteConnectionManager>,
    pub config: AppConfig,
    pub engine: MatchEngine,
    pub notifier: Notifier,
}
