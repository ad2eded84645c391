use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Args;

use super::load_config;

#[derive(Args)]
pub struct ValidateArgs {
    /// Configuration to check (defaults to --config)
    pub path: Option<PathBuf>,

    /// Only report problems; do not print the resolved configuration
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: ValidateArgs, config_path: Option<&Path>) -> Result<()> {
    let Some(path) = args.path.as_deref().or(config_path) else {
        bail!("No configuration given; pass a path or set --config");
    };

    let config = load_config(Some(path))?;
    if !args.quiet {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    }
    eprintln!("{} is valid", path.display());

    Ok(())
}
