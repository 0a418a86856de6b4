pub mod bootstrap;
pub mod cleanup;
pub mod server;
