use anyhow::Result;

use dropclash_backend::cli::Command;
use dropclash_backend::{handle_bootstrap, handle_cleanup, handle_serve, interpret};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Serve { port } => handle_serve(*port),
        Command::Bootstrap => handle_bootstrap(),
        Command::Cleanup => handle_cleanup(),
    }
}
