//! Thin async wrapper around the `git` executable

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, instrument};

use super::error::{GitError, Result};

/// Runs git subcommands against one working copy.
#[derive(Debug, Clone)]
pub struct GitCommand {
    repo_path: PathBuf,
}

impl GitCommand {
    /// Bind to an existing working copy. Fails when `repo_path` has no `.git` entry.
    pub fn open(repo_path: impl AsRef<Path>) -> Result<Self> {
        let path = repo_path.as_ref().to_path_buf();
        if !path.join(".git").exists() {
            return Err(GitError::NotARepository(path));
        }
        Ok(Self { repo_path: path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run `git <args>` in the working copy and return stdout, lossily decoded.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let stdout = self.run_raw(args).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// Run `git <args>` and return raw stdout bytes.
    #[instrument(skip(self), fields(repo = %self.repo_path.display()))]
    pub async fn run_raw(&self, args: &[&str]) -> Result<Vec<u8>> {
        run_git(Some(&self.repo_path), args).await
    }
}

/// Shallow clone of `url` into `target`, fetching every branch head.
#[instrument(skip(target), fields(target = %target.display()))]
pub async fn clone_shallow(url: &str, target: &Path, depth: u32) -> Result<()> {
    let depth = depth.max(1).to_string();
    let target = target.to_string_lossy();
    run_git(
        None,
        &[
            "clone",
            "--quiet",
            "--depth",
            &depth,
            "--no-single-branch",
            "--",
            url,
            &target,
        ],
    )
    .await?;
    Ok(())
}

async fn run_git(cwd: Option<&Path>, args: &[&str]) -> Result<Vec<u8>> {
    let command = args.join(" ");
    debug!(command = %command, "running git");

    let mut cmd = Command::new("git");
    // paths come back verbatim instead of as C-quoted octal escapes
    cmd.args(["-c", "core.quotePath=false"])
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|source| GitError::Spawn {
        command: command.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(GitError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_rejects_plain_directory() {
        let dir = TempDir::new().unwrap();
        let result = GitCommand::open(dir.path());
        assert!(matches!(result, Err(GitError::NotARepository(_))));
    }

    #[tokio::test]
    async fn test_failed_command_carries_stderr() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let git = GitCommand::open(dir.path()).unwrap();

        let err = git.run(&["rev-parse", "--verify", "HEAD"]).await.unwrap_err();
        match err {
            GitError::CommandFailed { command, .. } => {
                assert_eq!(command, "rev-parse --verify HEAD")
            }
            GitError::Spawn { .. } => {} // git not installed on this host
            other => panic!("unexpected error: {other}"),
        }
    }
}
