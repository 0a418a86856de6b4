use anyhow::Result;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::api::handlers::AppState;
use crate::api::routes::create_router;
use crate::config::AppConfig;
use crate::database::{self, get_connection, levels, setup};
use crate::engine::MatchEngine;
use crate::notify::{LogSink, spawn_delivery_worker};

pub struct ServerService {
    port: u16,
    config: AppConfig,
}

impl ServerService {
    pub fn new(port: u16, config: AppConfig) -> Self {
        Self { port, config }
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

        let (notifier, _delivery) = spawn_delivery_worker(pool.clone(), LogSink);
        let engine = MatchEngine::new(pool.clone(), self.config.engine.clone(), notifier.clone());

        spawn_cleanup_task(engine.clone(), self.config.engine.cleanup_interval_secs);

        let state = Arc::new(AppState {
            pool,
            config: self.config.clone(),
            engine,
            notifier,
        });

        let app = create_router(state).layer(CorsLayer::permissive());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Runs the abandonment sweep on a fixed cadence for as long as the server
/// lives. A failing sweep is logged and retried at the next tick.
fn spawn_cleanup_task(engine: MatchEngine, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick fires immediately and catches up after downtime.
        loop {
            ticker.tick().await;
            if let Err(err) = engine.cleanup_sweep() {
                warn!("cleanup sweep failed: {err}");
            }
        }
    });
}
