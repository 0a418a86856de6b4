use anyhow::{Context, Result};
use rusqlite::Connection;

/// Applies `schema.sql`. Every statement is `IF NOT EXISTS`, so running this
/// against an already-initialized database is a no-op.
pub fn initialize_database(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    let statements = split_sql_statements(schema_sql);

    for (idx, statement) in statements.iter().enumerate() {
        execute_sql(conn, statement)
            .with_context(|| format!("Failed to execute statement {}", idx + 1))?;
    }

    log::info!("Database schema initialized");
    Ok(())
}

/// Drops every table and recreates the schema from scratch.
pub fn reset_database(conn: &Connection) -> Result<()> {
    let tables = [
        "users",
        "levels",
        "games",
        "friends",
        "friend_requests",
        "auth_tokens",
        "login_codes",
        "push_tokens",
        "life_requests",
    ];
    for table in tables {
        execute_sql(conn, &format!("DROP TABLE IF EXISTS {table}"))
            .with_context(|| format!("Failed to drop table {table}"))?;
    }

    initialize_database(conn)?;

    log::info!("Database schema reset successfully");
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn execute_sql(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute(sql, [])
        .context("Failed to execute SQL statement")
        .map(|_| ())
}
