use anyhow::Result;
use log::info;

use crate::database::{self, get_connection, levels, setup};

/// Drops and recreates the schema, then seeds the level table. Meant for
/// development setups and fresh deployments, not for running installs.
pub struct BootstrapService;

impl BootstrapService {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self) -> Result<()> {
        let db_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "dropclash.db".to_string());

        info!("Bootstrapping database at {}", db_path);

        let pool = database::create_pool(&db_path)?;
        let conn = get_connection(&pool)?;
        setup::reset_database(&conn)?;
        levels::seed_levels(&conn)?;

        info!("Database bootstrap complete");
        Ok(())
    }
}

impl Default for BootstrapService {
    fn default() -> Self {
        Self::new()
    }
}
