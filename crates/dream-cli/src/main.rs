use clap::Parser;
use tracing::Level;

mod cli;
mod commands;
mod config;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = config::CliConfig::resolve(&cli)?;
    commands::run_command(cli, &config)
}
