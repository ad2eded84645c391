//! Working copy of the content repository.
//!
//! All git interaction goes through [`CommandRunner`], so callers own an
//! explicit [`RepositoryAccessor`] instead of a process-wide repository handle.

mod diff;
mod runner;

pub use diff::{DiffRecord, DiffStatus};
#[cfg(test)]
pub use runner::MockCommandRunner;
pub use runner::{CommandOutput, CommandRunner, GitCli};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Upstream security content repository
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/splunk/security_content";

/// Branch every change set is compared against
pub const DEFAULT_BASE_BRANCH: &str = "develop";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

/// A checkout of the content repository at `root`.
pub struct RepositoryAccessor<R: CommandRunner = GitCli> {
    root: PathBuf,
    remote_url: String,
    base_branch: String,
    runner: R,
}

impl RepositoryAccessor<GitCli> {
    /// Accessor that clones `remote_url` into `root` on first checkout.
    pub fn new(root: impl Into<PathBuf>, remote_url: &str, base_branch: &str) -> Self {
        Self::with_runner(root, remote_url, base_branch, GitCli)
    }

    /// Accessor over a directory that is already checked out; no clone happens.
    pub fn open_existing(root: impl Into<PathBuf>, base_branch: &str) -> Self {
        Self::with_runner(root, DEFAULT_REPOSITORY_URL, base_branch, GitCli)
    }
}

impl<R: CommandRunner> RepositoryAccessor<R> {
    pub fn with_runner(
        root: impl Into<PathBuf>,
        remote_url: &str,
        base_branch: &str,
        runner: R,
    ) -> Self {
        Self {
            root: root.into(),
            remote_url: remote_url.to_string(),
            base_branch: base_branch.to_string(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    /// Clone if absent, fetch the pull request head into `branch` when given,
    /// then check `branch` out.
    pub fn checkout(&self, branch: &str, pull_request: Option<u64>) -> Result<(), RepositoryError> {
        if !self.root.join(".git").exists() {
            info!(
                "Cloning {} ({}) into {}",
                self.remote_url,
                self.base_branch,
                self.root.display()
            );
            self.git(&[
                "clone".to_string(),
                "--branch".to_string(),
                self.base_branch.clone(),
                self.remote_url.clone(),
                self.root.to_string_lossy().to_string(),
            ])?;
        }

        if let Some(number) = pull_request {
            info!("Fetching pull request #{} into {}", number, branch);
            self.git_in_root(&[
                "fetch".to_string(),
                "origin".to_string(),
                format!("refs/pull/{}/head:{}", number, branch),
            ])?;
        }

        self.git_in_root(&["checkout".to_string(), branch.to_string()])?;
        Ok(())
    }

    /// Added and modified files between `base` and `target`.
    ///
    /// Comparing a branch with itself yields nothing and runs no git command.
    pub fn diff(&self, base: &str, target: &str) -> Result<Vec<DiffRecord>, RepositoryError> {
        if base == target {
            debug!("Not diffing {} against itself", base);
            return Ok(Vec::new());
        }

        let output = self.git_in_root(&[
            "diff".to_string(),
            "--name-status".to_string(),
            format!("{}...{}", base, target),
        ])?;

        Ok(output.lines().filter_map(DiffRecord::parse).collect())
    }

    fn git_in_root(&self, args: &[String]) -> Result<String, RepositoryError> {
        let mut full = vec!["-C".to_string(), self.root.to_string_lossy().to_string()];
        full.extend_from_slice(args);
        self.git(&full)
    }

    fn git(&self, args: &[String]) -> Result<String, RepositoryError> {
        let command = args.join(" ");
        debug!("git {}", command);

        let output = self
            .runner
            .run(args)
            .map_err(|source| RepositoryError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.success {
            return Err(RepositoryError::Failed {
                command,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}
