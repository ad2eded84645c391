//! Process seam for git invocations

use std::process::Command;

/// Captured result of one command invocation
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `git` with an argument vector.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    fn run(&self, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Shells out to the `git` binary on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl CommandRunner for GitCli {
    fn run(&self, args: &[String]) -> std::io::Result<CommandOutput> {
        let output = Command::new("git").args(args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
