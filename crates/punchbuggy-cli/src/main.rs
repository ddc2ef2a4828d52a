mod cli;
mod cmd;
mod config_gen;
mod context;
mod dispatch;
mod prompt;
mod signal;
mod table;

use clap::Parser;

use punchbuggy_core::config;

use cli::{Cli, Commands};
use config_gen::run_config_generate;
use context::AppContext;
use dispatch::dispatch_command;

fn main() {
    let cli = Cli::parse();

    // `watch` is a long-running loop; show its backups without -v
    let filter = match cli.verbose {
        0 if matches!(cli.command, Commands::Watch { .. }) => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // No config file needed to write one
    if let Commands::Config { dest } = &cli.command {
        if let Err(e) = run_config_generate(dest.as_deref()) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let (config, source) = match config::load_or_default(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    match &source {
        Some(source) => tracing::info!("Using config: {source}"),
        None => tracing::info!("No config file found, using defaults"),
    }

    // `migrate` reports on the stored state itself
    let upgrade_state = !matches!(cli.command, Commands::Migrate);
    let ctx = match AppContext::open(config, upgrade_state) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = dispatch_command(&cli.command, &ctx) {
        tracing::debug!(command = cli.command.name(), error = %e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
