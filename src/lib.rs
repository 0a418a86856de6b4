pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod engine;
pub mod errors;
pub mod notify;
pub mod services;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

use crate::cli::Command;
use crate::config::AppConfig;
use crate::services::bootstrap::BootstrapService;
use crate::services::cleanup::CleanupService;
use crate::services::server::ServerService;

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

pub fn handle_serve(port: u16) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = AppConfig::new();
        let service = ServerService::new(port, config);
        service.run().await
    })
}

pub fn handle_bootstrap() -> Result<()> {
    let service = BootstrapService::new();
    service.run()
}

pub fn handle_cleanup() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = AppConfig::new();
        let service = CleanupService::new(config);
        service.run().await
    })
}
