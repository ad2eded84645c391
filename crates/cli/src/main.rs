use anyhow::Result;
use clap::Parser;

mod cli;

use cli::{Cli, Commands};
use contentci_core::env::CONTENTCI_LOG;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the selected test paths
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(CONTENTCI_LOG)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Select(args) => crate::cli::select::run(args, cli.config.as_deref()),
        Commands::Classify(args) => crate::cli::classify::run(args, cli.config.as_deref()),
        Commands::Generate(args) => crate::cli::generate::run(args),
        Commands::Validate(args) => crate::cli::validate::run(args, cli.config.as_deref()),
        Commands::Init(args) => crate::cli::init::run(args),
    }
}
