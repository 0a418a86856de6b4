use anyhow::{Context, Result};
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

pub fn create_pool(database_path: &str) -> Result<DbPool> {
    let manager = build_manager(database_path);
    r2d2::Pool::builder()
        .build(manager)
        .context("Failed to create database connection pool")
}

/// Single-connection pool over a private in-memory database, used by tests.
pub fn create_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(apply_pragmas);
    r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .context("Failed to create in-memory connection pool")
}

fn build_manager(path: &str) -> SqliteConnectionManager {
    SqliteConnectionManager::file(path).with_init(apply_pragmas)
}

fn apply_pragmas(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
}

pub fn get_connection(pool: &DbPool) -> Result<DbConn> {
    pool.get()
        .context("Failed to get database connection from pool")
}
