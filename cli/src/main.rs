//! tablecat - command-line client for tablecat catalogs
//!
//! # Usage
//!
//! ```bash
//! tablecat --config catalog.toml insert --record '{"email":"a@x","phone":"555-1","created":"2026-01-01T00:00:00Z"}'
//! tablecat --config catalog.toml query --filter phone=555-1
//! tablecat --config catalog.toml query --filter phone=555-1 --from 2026-01-01 --to 2026-02-01
//! tablecat --config catalog.toml delete --filter email=a@x
//! tablecat --config catalog.toml recover --all
//! tablecat --config catalog.toml recover --watch
//! ```

use clap::Parser;
use tablecat_cli::args::Cli;
use tablecat_cli::commands::{execute, load_config, open_catalog};
use tablecat_cli::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_logging(&config.logging)?;

    let catalog = open_catalog(&config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = execute(&catalog, &cli.command, &mut out).await {
        log::error!("{} failed: {}", command_name(&cli), e);
        return Err(e);
    }
    Ok(())
}

fn command_name(cli: &Cli) -> &'static str {
    use tablecat_cli::args::Command;
    match cli.command {
        Command::Insert { .. } => "insert",
        Command::Query { .. } => "query",
        Command::Delete { .. } => "delete",
        Command::Recover { .. } => "recover",
    }
}
