pub mod classify;
pub mod generate;
pub mod init;
pub mod select;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contentci_core::RunConfig;
use contentci_core::config::ConfigError;
use contentci_core::env::CONTENTCI_CONFIG;
use tracing::info;

#[derive(Parser)]
#[command(name = "contentci")]
#[command(author, version, about = "Detection test selection and generation for content CI")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run configuration (JSON or YAML)
    #[arg(short, long, global = true, env = CONTENTCI_CONFIG)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the detection tests a CI run should execute
    Select(select::SelectArgs),

    /// Split detections into to-test, not-to-test and errored by type
    Classify(classify::ClassifyArgs),

    /// Generate LOLBAS detections, tests, lookup and dataset
    Generate(generate::GenerateArgs),

    /// Check a run configuration and print it with defaults applied
    Validate(validate::ValidateArgs),

    /// Write a commented run configuration
    Init(init::InitArgs),
}

/// Load the run configuration, or the defaults when none is given.
///
/// Validation issues are printed one per line before the error is returned.
pub fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let Some(path) = path else {
        info!("No run configuration given, using defaults");
        return Ok(RunConfig::default());
    };

    match RunConfig::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::Invalid(issues)) => {
            for issue in &issues {
                eprintln!("  {}", issue);
            }
            Err(ConfigError::Invalid(issues))
                .with_context(|| format!("Invalid run configuration {}", path.display()))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

/// Print `lines` to stdout, or write them newline-terminated to `output`.
pub fn emit_lines(lines: &[String], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let mut content = lines.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} paths to {}", lines.len(), path.display());
        }
        None => {
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_config_reports_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        std::fs::write(&path, r#"{ mode: "sometimes", num_containers: 0 }"#).unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Invalid(issues)) => assert_eq!(issues.len(), 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_emit_lines_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tests.txt");

        emit_lines(
            &["tests/endpoint/a.test.yml".to_string(), "tests/cloud/b.test.yml".to_string()],
            Some(&path),
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "tests/endpoint/a.test.yml\ntests/cloud/b.test.yml\n"
        );

        emit_lines(&[], Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
