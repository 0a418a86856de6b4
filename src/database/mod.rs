pub mod connection;
pub mod friends;
pub mod games;
pub mod levels;
pub mod lives;
pub mod models;
pub mod setup;
pub mod tokens;
pub mod users;

pub use connection::{create_memory_pool, create_pool, get_connection, DbConn, DbPool};
pub use models::*;
