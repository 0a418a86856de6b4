pub mod cleanup;
pub mod lifecycle;
pub mod matchmaking;

pub use cleanup::CleanupStats;

use crate::config::EngineSettings;
use crate::database::DbPool;
use crate::notify::Notifier;

/// Drives a match through its whole life: creation and pairing, per-side
/// starts and score reports, settlement of points, and the sweep that closes
/// whatever players abandon.
///
/// All methods are synchronous; callers in async context invoke them directly,
/// the same way the rest of the crate talks to SQLite.
#[derive(Clone)]
pub struct MatchEngine {
    pool: DbPool,
    settings: EngineSettings,
    notifier: Notifier,
}

impl MatchEngine {
    pub fn new(pool: DbPool, settings: EngineSettings, notifier: Notifier) -> Self {
        Self {
            pool,
            settings,
            notifier,
        }
    }
}
