use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use contentci_core::config::DEFAULT_CONFIG_TEMPLATE;

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the configuration
    #[arg(default_value = "contentci.json5")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists; use --force to overwrite",
            args.path.display()
        );
    }

    if let Some(parent) = args.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&args.path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", args.path.display()))?;

    println!("Wrote run configuration to {}", args.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentci_core::RunConfig;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ci/contentci.json5");

        run(InitArgs {
            path: path.clone(),
            force: false,
        })
        .unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.branch, "develop");

        assert!(
            run(InitArgs {
                path: path.clone(),
                force: false,
            })
            .is_err()
        );
        run(InitArgs { path, force: true }).unwrap();
    }
}
