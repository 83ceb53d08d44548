//! Git Repository Test Helpers
//!
//! Builds real git repositories in temporary directories so extraction and pipeline
//! tests run against actual `git` output instead of mocks.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Someone who authors commits in a test repository
#[derive(Debug, Clone, Copy)]
pub struct Author {
    pub name: &'static str,
    pub email: &'static str,
}

pub const ALICE: Author = Author {
    name: "Alice Example",
    email: "alice@example.com",
};
pub const BOB: Author = Author {
    name: "Bob Example",
    email: "bob@example.com",
};
pub const CAROL: Author = Author {
    name: "Carol Example",
    email: "carol@example.com",
};

pub const C1_DATE: &str = "2024-01-01T10:00:00+00:00";
pub const C2_DATE: &str = "2024-01-02T11:30:00+00:00";
pub const C3_DATE: &str = "2024-01-03T09:15:00+00:00";

pub const TEN_LINES: &str = "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\nnine\nten\n";
// drops the first three lines and adds two
pub const TEN_LINES_EDITED: &str = "uno\ndos\nfour\nfive\nsix\nseven\neight\nnine\nten\n";

/// A test git repository with a `main` branch
pub struct TestGitRepository {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestGitRepository {
    /// An initialized repository with no commits
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()
            .context("Failed to create temporary directory for test git repository")?;
        let path = temp_dir.path().join("origin");
        fs::create_dir_all(&path)?;

        Self::run_git_command(&path, &["init", "--quiet"])
            .context("Failed to initialize git repository")?;
        Self::run_git_command(&path, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        Self::run_git_command(&path, &["config", "user.name", "Repolyze Test"])?;
        Self::run_git_command(&path, &["config", "user.email", "test@repolyze.dev"])?;
        Self::run_git_command(&path, &["config", "commit.gpgsign", "false"])?;

        Ok(TestGitRepository { temp_dir, path })
    }

    /// Three commits by three authors:
    /// C1 adds `README.md`, `src/lib.rs` and `tools/run.py`; C2 adds `a.txt` with ten
    /// lines; C3 rewrites `a.txt` (+2/-3). `develop` points at C2, `feature/login` at C3.
    pub fn with_history() -> Result<Self> {
        let repo = Self::new()?;

        repo.write_file("README.md", "# demo\n\nA small fixture.\n")?;
        repo.write_file(
            "src/lib.rs",
            "pub fn answer() -> u32 {\n    42\n}\n\npub fn double(x: u32) -> u32 {\n    x * 2\n}\n",
        )?;
        repo.write_file("tools/run.py", "import sys\nprint(sys.argv)\n")?;
        repo.commit_as(ALICE, C1_DATE, "Initial import", None)?;

        repo.write_file("a.txt", TEN_LINES)?;
        repo.commit_as(BOB, C2_DATE, "Add a.txt", None)?;

        repo.write_file("a.txt", TEN_LINES_EDITED)?;
        repo.commit_as(
            CAROL,
            C3_DATE,
            "Rework a.txt",
            Some("Replaces the opening | keeps the rest\nSecond | line"),
        )?;

        repo.run(&["branch", "develop", "HEAD~1"])?;
        repo.run(&["branch", "feature/login"])?;
        Ok(repo)
    }

    pub fn write_file(&self, relative: &str, content: impl AsRef<[u8]>) -> Result<()> {
        let full = self.path.join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content).with_context(|| format!("Failed to write {relative}"))
    }

    /// Stage everything and commit with fixed author and committer identity and date.
    pub fn commit_as(
        &self,
        author: Author,
        date: &str,
        subject: &str,
        body: Option<&str>,
    ) -> Result<()> {
        Self::run_git_command(&self.path, &["add", "--all"])?;

        let mut args = vec!["commit", "--quiet", "--allow-empty", "-m", subject];
        if let Some(body) = body {
            args.extend(["-m", body]);
        }

        let output = Command::new("git")
            .current_dir(&self.path)
            .args(&args)
            .env("GIT_AUTHOR_NAME", author.name)
            .env("GIT_AUTHOR_EMAIL", author.email)
            .env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_NAME", author.name)
            .env("GIT_COMMITTER_EMAIL", author.email)
            .env("GIT_COMMITTER_DATE", date)
            .output()
            .context("Failed to execute git commit")?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "Git commit failed: {}\nStderr: {}",
                subject,
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(())
    }

    /// Run git in the repository and return trimmed stdout.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        Self::run_git_command(&self.path, args)
    }

    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        self.run(&["rev-parse", rev])
    }

    /// The repository path as a clone URL
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn path_ref(&self) -> &Path {
        &self.path
    }

    /// Runs a git command in the specified repository directory
    fn run_git_command(repo_path: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .current_dir(repo_path)
            .args(args)
            .output()
            .context(format!(
                "Failed to execute git command: git {}",
                args.join(" ")
            ))?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "Git command failed: git {}\nStderr: {}\nStdout: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr),
                String::from_utf8_lossy(&output.stdout)
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_repository_creation() -> Result<()> {
        let repo = TestGitRepository::with_history()?;

        assert!(repo.path_ref().join(".git").exists());
        assert!(repo.path_ref().join("src").join("lib.rs").exists());

        let log = repo.run(&["log", "--format=%s", "main"])?;
        assert_eq!(log.lines().count(), 3);
        assert!(log.contains("Initial import"));
        Ok(())
    }
}
