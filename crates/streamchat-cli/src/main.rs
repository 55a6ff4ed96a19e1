mod cli;
mod commands;
mod config;
mod error;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::{CliConfig, Settings};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = CliConfig::load(cli.config.as_deref());
    let settings = Settings::resolve(&cli, &file_config)?;

    match cli.command {
        Commands::Ask(args) => commands::ask::run(&settings, args).await,
        Commands::Chat(args) => commands::chat::run(&settings, args).await,
    }
}

/// Log to a daily file in the data dir; stdout carries the conversation.
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    let log_dir = dirs::data_dir()?.join("streamchat").join("logs");
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "streamchat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Some(guard)
}
