use anyhow::Result;
use log::info;

use crate::config::AppConfig;
use crate::database::{self, get_connection, levels, setup};
use crate::engine::MatchEngine;
use crate::notify::{LogSink, spawn_delivery_worker};

/// One-shot abandonment sweep, for cron jobs and operators. The server runs
/// the same sweep on its own timer.
pub struct CleanupService {
    config: AppConfig,
}

impl CleanupService {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<()> {
        let db_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "dropclash.db".to_string());

        let pool = database::create_pool(&db_path)?;
        {
            let conn = get_connection(&pool)?;
            setup::initialize_database(&conn)?;
            levels::seed_levels(&conn)?;
        }

        let (notifier, delivery) = spawn_delivery_worker(pool.clone(), LogSink);
        let engine = MatchEngine::new(pool, self.config.engine.clone(), notifier);

        let stats = engine.cleanup_sweep()?;
        info!(
            "Cleanup finished: {} unanswered removed, {} forced completions, {} forfeits, {} expired life requests",
            stats.unanswered_removed,
            stats.forced_completions,
            stats.forfeits,
            stats.expired_life_requests
        );

        // Dropping the engine closes the notification channel; waiting on
        // the worker flushes any pushes the sweep produced.
        drop(engine);
        delivery.await?;

        Ok(())
    }
}
