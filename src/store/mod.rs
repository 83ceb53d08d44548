//! Persistence boundary for analysis results
//!
//! The pipeline only talks to [`AnalysisStore`]. Two implementations ship with the
//! crate: [`MemoryStore`] for single-process use and tests, and [`PgAnalysisStore`]
//! backed by Postgres through sqlx.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::git::{
    BranchInfo, CommitInfo, ContributorStats, FileChange, FileEntry, LanguageShare,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgAnalysisStore;

/// Lifecycle of a repository's analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl RepositoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryStatus::Pending => "pending",
            RepositoryStatus::Analyzing => "analyzing",
            RepositoryStatus::Completed => "completed",
            RepositoryStatus::Failed => "failed",
        }
    }

    /// Whether a create-or-get request should queue an analysis for a repository in this state.
    pub fn needs_analysis(&self) -> bool {
        matches!(self, RepositoryStatus::Pending | RepositoryStatus::Failed)
    }
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RepositoryStatus::Pending),
            "analyzing" => Ok(RepositoryStatus::Analyzing),
            "completed" => Ok(RepositoryStatus::Completed),
            "failed" => Ok(RepositoryStatus::Failed),
            other => Err(anyhow::anyhow!("unknown repository status: {other}")),
        }
    }
}

/// A repository registered for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub status: RepositoryStatus,
    pub default_branch: Option<String>,
    /// Bytes on disk of the last analyzed clone
    pub size: u64,
    pub last_analyzed_at: Option<DateTime<Utc>>,
    /// Message of the most recent failed analysis, cleared on success
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewRepository<'a> {
    pub user_id: Uuid,
    pub url: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
}

/// Values written when an analysis completes
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub default_branch: String,
    pub size: u64,
    pub analyzed_at: DateTime<Utc>,
}

/// Create/update/query operations the pipeline needs from persistence.
///
/// Natural keys: repositories by (user_id, url), branches by (repository, name), commits
/// by (repository, hash), files by (repository, path). Implementations must be safe to
/// share between concurrent analyses of different repositories.
#[async_trait]
pub trait AnalysisStore: Send + Sync + 'static {
    async fn find_repository(&self, id: Uuid) -> Result<Option<RepositoryRecord>>;

    async fn find_repository_by_url(
        &self,
        url: &str,
        user_id: Uuid,
    ) -> Result<Option<RepositoryRecord>>;

    /// Insert a `pending` repository, or return the existing row for (user_id, url).
    /// The flag is true when a row was created.
    async fn create_repository(
        &self,
        repository: NewRepository<'_>,
    ) -> Result<(RepositoryRecord, bool)>;

    async fn list_repositories(&self, user_id: Uuid) -> Result<Vec<RepositoryRecord>>;

    /// Delete a repository and everything derived from it. False if it did not exist.
    async fn delete_repository(&self, id: Uuid) -> Result<bool>;

    async fn set_status(
        &self,
        id: Uuid,
        status: RepositoryStatus,
        last_error: Option<&str>,
    ) -> Result<()>;

    /// Mark completed and record the summary fields.
    async fn complete_analysis(&self, id: Uuid, summary: &AnalysisSummary) -> Result<()>;

    /// Insert branches whose names are new; returns how many were inserted.
    async fn insert_branches(&self, repository_id: Uuid, branches: &[BranchInfo])
        -> Result<usize>;

    async fn commit_hashes(&self, repository_id: Uuid) -> Result<HashSet<String>>;

    /// Insert one commit row (without its file changes) and return its id.
    async fn insert_commit(&self, repository_id: Uuid, commit: &CommitInfo) -> Result<Uuid>;

    async fn insert_file_changes(&self, commit_id: Uuid, changes: &[FileChange])
        -> Result<usize>;

    async fn file_paths(&self, repository_id: Uuid) -> Result<HashSet<String>>;

    /// Insert files whose paths are new; returns how many were inserted.
    async fn insert_files(&self, repository_id: Uuid, files: &[FileEntry]) -> Result<usize>;

    async fn replace_contributors(
        &self,
        repository_id: Uuid,
        contributors: &[ContributorStats],
    ) -> Result<()>;

    async fn replace_languages(&self, repository_id: Uuid, languages: &[LanguageShare])
        -> Result<()>;

    async fn branches(&self, repository_id: Uuid) -> Result<Vec<BranchInfo>>;

    /// Newest commits first, with file changes attached.
    async fn commits(&self, repository_id: Uuid, limit: usize) -> Result<Vec<CommitInfo>>;

    async fn files(&self, repository_id: Uuid) -> Result<Vec<FileEntry>>;

    async fn contributors(&self, repository_id: Uuid) -> Result<Vec<ContributorStats>>;

    async fn languages(&self, repository_id: Uuid) -> Result<Vec<LanguageShare>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips() {
        for status in [
            RepositoryStatus::Pending,
            RepositoryStatus::Analyzing,
            RepositoryStatus::Completed,
            RepositoryStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RepositoryStatus>().unwrap(), status);
        }
        assert!("queued".parse::<RepositoryStatus>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        assert!(RepositoryStatus::Pending.needs_analysis());
        assert!(RepositoryStatus::Failed.needs_analysis());
        assert!(!RepositoryStatus::Completed.needs_analysis());
        assert!(!RepositoryStatus::Analyzing.needs_analysis());
    }
}
