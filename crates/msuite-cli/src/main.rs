use clap::Parser;
use msuite_server::ServiceConfig;
use tracing::Level;

mod cli;
mod commands;

fn log_level(verbose: u8, configured: &str) -> Level {
    match verbose {
        0 => configured.parse().unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose, &config.log_level))
        .init();
    commands::run_command(cli, config)
}
