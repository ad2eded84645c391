use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use contentci_core::config::SelectionMode;
use contentci_core::pruner::{DetectionPruner, PruneOptions};
use contentci_core::repository::RepositoryAccessor;
use tracing::info;

use super::{emit_lines, load_config};

#[derive(Args)]
pub struct SelectArgs {
    /// Branch under test (overrides config)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Selection mode: changes, selected or new (overrides config)
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: Option<SelectionMode>,

    /// Pull request whose head is fetched into the branch (overrides config)
    #[arg(long)]
    pub pr_number: Option<u64>,

    /// Use the repository checkout as is, without cloning or checking out
    #[arg(long)]
    pub no_checkout: bool,

    /// Keep ssa___ detections
    #[arg(long)]
    pub include_ssa: bool,

    /// Write a CSV summary of the selected detections
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Write the test paths to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: SelectArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let branch = args.branch.unwrap_or_else(|| config.branch.clone());
    let mode = args.mode.unwrap_or(config.mode);
    let root = config.repository_root();

    let repo = if args.no_checkout {
        RepositoryAccessor::open_existing(&root, &config.base_branch)
    } else {
        let repo = RepositoryAccessor::new(&root, &config.repository_url, &config.base_branch);
        repo.checkout(&branch, args.pr_number.or(config.pr_number))
            .with_context(|| format!("Failed to check out {}", branch))?;
        repo
    };

    let pruner = DetectionPruner::new(repo.root());
    let criteria = config.criteria();
    let options = PruneOptions {
        exclude_ssa: !args.include_ssa,
        summary_path: args.summary,
    };
    let tests = match mode {
        SelectionMode::Changes => pruner.select_changed_files(&repo, &branch, &criteria, &options)?,
        SelectionMode::Selected => pruner.select_given_files(&config.detections, &criteria, &options)?,
        SelectionMode::New => pruner.select_all_files(&config.folders(), &criteria, &options)?,
    };
    info!("Mode {:?} selected {} tests", mode, tests.len());

    emit_lines(&tests, args.output.as_deref())
}

fn parse_mode(s: &str) -> Result<SelectionMode, String> {
    match s {
        "changes" => Ok(SelectionMode::Changes),
        "selected" => Ok(SelectionMode::Selected),
        "new" => Ok(SelectionMode::New),
        other => Err(format!(
            "unknown mode '{}', expected changes, selected or new",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("new").unwrap(), SelectionMode::New);
        assert!(parse_mode("all").is_err());
    }

    #[test]
    fn test_selected_mode_without_checkout() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("content");
        for (path, content) in [
            ("detections/endpoint/a.yml", "type: TTP\nname: A\n"),
            ("tests/endpoint/a.test.yml", "name: A Unit Test\n"),
            ("detections/endpoint/b.yml", "type: Baseline\nname: B\n"),
            ("tests/endpoint/b.test.yml", "name: B Unit Test\n"),
        ] {
            let path = repo.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let config = temp_dir.path().join("run.yml");
        fs::write(
            &config,
            format!(
                "mode: selected\nrepository_path: {}\ndetections:\n  - detections/endpoint/a.yml\n  - detections/endpoint/b.yml\n",
                repo.display()
            ),
        )
        .unwrap();

        let output = temp_dir.path().join("tests.txt");
        let summary = temp_dir.path().join("summary.csv");
        run(
            SelectArgs {
                branch: None,
                mode: None,
                pr_number: None,
                no_checkout: true,
                include_ssa: false,
                summary: Some(summary.clone()),
                output: Some(output.clone()),
            },
            Some(&config),
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "tests/endpoint/a.test.yml\n");
        assert_eq!(fs::read_to_string(&summary).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_new_mode_includes_ssa_on_request() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("content");
        for (path, content) in [
            ("detections/cloud/a.yml", "type: Anomaly\n"),
            ("tests/cloud/a.test.yml", "name: A Unit Test\n"),
            ("detections/cloud/ssa___b.yml", "type: TTP\n"),
            ("tests/cloud/ssa___b.test.yml", "name: B Unit Test\n"),
            ("detections/network/c.yml", "type: TTP\n"),
            ("tests/network/c.test.yml", "name: C Unit Test\n"),
        ] {
            let path = repo.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let config = temp_dir.path().join("run.yml");
        fs::write(
            &config,
            format!("mode: selected\nrepository_path: {}\ntypes: [cloud]\n", repo.display()),
        )
        .unwrap();

        let output = temp_dir.path().join("tests.txt");
        run(
            SelectArgs {
                branch: None,
                mode: Some(SelectionMode::New),
                pr_number: None,
                no_checkout: true,
                include_ssa: true,
                summary: None,
                output: Some(output.clone()),
            },
            Some(&config),
        )
        .unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "tests/cloud/a.test.yml\ntests/cloud/ssa___b.test.yml\n"
        );
    }
}
