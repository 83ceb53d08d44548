//! Process-local store

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{AnalysisStore, AnalysisSummary, NewRepository, RepositoryRecord, RepositoryStatus};
use crate::git::{
    BranchInfo, CommitInfo, ContributorStats, FileChange, FileEntry, LanguageShare,
};

#[derive(Default)]
struct RepositoryData {
    branches: Vec<BranchInfo>,
    commits: Vec<(Uuid, CommitInfo)>,
    files: Vec<FileEntry>,
    contributors: Vec<ContributorStats>,
    languages: Vec<LanguageShare>,
}

#[derive(Default)]
struct State {
    repositories: HashMap<Uuid, RepositoryRecord>,
    data: HashMap<Uuid, RepositoryData>,
    commit_owners: HashMap<Uuid, Uuid>,
    rejected_commits: HashSet<String>,
}

/// [`AnalysisStore`] held entirely in memory.
///
/// Enforces the same natural keys as the Postgres schema: inserting a commit hash twice
/// for one repository is an error, branch and file inserts skip known keys.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later insert of `hash` fail, as a constraint violation would.
    pub fn reject_commit(&self, hash: impl Into<String>) {
        self.state.write().rejected_commits.insert(hash.into());
    }

    fn data_mut<'a>(state: &'a mut State, repository_id: Uuid) -> Result<&'a mut RepositoryData> {
        if !state.repositories.contains_key(&repository_id) {
            bail!("repository {repository_id} does not exist");
        }
        Ok(state.data.entry(repository_id).or_default())
    }

    fn read_data<T>(&self, repository_id: Uuid, read: impl FnOnce(&RepositoryData) -> T) -> T
    where
        T: Default,
    {
        let state = self.state.read();
        state.data.get(&repository_id).map(read).unwrap_or_default()
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn find_repository(&self, id: Uuid) -> Result<Option<RepositoryRecord>> {
        Ok(self.state.read().repositories.get(&id).cloned())
    }

    async fn find_repository_by_url(
        &self,
        url: &str,
        user_id: Uuid,
    ) -> Result<Option<RepositoryRecord>> {
        Ok(self
            .state
            .read()
            .repositories
            .values()
            .find(|repo| repo.url == url && repo.user_id == user_id)
            .cloned())
    }

    async fn create_repository(
        &self,
        repository: NewRepository<'_>,
    ) -> Result<(RepositoryRecord, bool)> {
        let mut state = self.state.write();
        if let Some(existing) = state
            .repositories
            .values()
            .find(|repo| repo.url == repository.url && repo.user_id == repository.user_id)
        {
            return Ok((existing.clone(), false));
        }

        let record = RepositoryRecord {
            id: Uuid::new_v4(),
            user_id: repository.user_id,
            url: repository.url.to_string(),
            name: repository.name.to_string(),
            description: repository.description.map(String::from),
            status: RepositoryStatus::Pending,
            default_branch: None,
            size: 0,
            last_analyzed_at: None,
            last_error: None,
            created_at: Utc::now(),
        };
        state.repositories.insert(record.id, record.clone());
        Ok((record, true))
    }

    async fn list_repositories(&self, user_id: Uuid) -> Result<Vec<RepositoryRecord>> {
        let mut repositories: Vec<RepositoryRecord> = self
            .state
            .read()
            .repositories
            .values()
            .filter(|repo| repo.user_id == user_id)
            .cloned()
            .collect();
        repositories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(repositories)
    }

    async fn delete_repository(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write();
        let existed = state.repositories.remove(&id).is_some();
        if let Some(data) = state.data.remove(&id) {
            for (commit_id, _) in data.commits {
                state.commit_owners.remove(&commit_id);
            }
        }
        Ok(existed)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: RepositoryStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let repo = state
            .repositories
            .get_mut(&id)
            .ok_or_else(|| anyhow!("repository {id} does not exist"))?;
        repo.status = status;
        if let Some(message) = last_error {
            repo.last_error = Some(message.to_string());
        }
        Ok(())
    }

    async fn complete_analysis(&self, id: Uuid, summary: &AnalysisSummary) -> Result<()> {
        let mut state = self.state.write();
        let repo = state
            .repositories
            .get_mut(&id)
            .ok_or_else(|| anyhow!("repository {id} does not exist"))?;
        repo.status = RepositoryStatus::Completed;
        repo.default_branch = Some(summary.default_branch.clone());
        repo.size = summary.size;
        repo.last_analyzed_at = Some(summary.analyzed_at);
        repo.last_error = None;
        Ok(())
    }

    async fn insert_branches(
        &self,
        repository_id: Uuid,
        branches: &[BranchInfo],
    ) -> Result<usize> {
        let mut state = self.state.write();
        let data = Self::data_mut(&mut state, repository_id)?;
        let mut inserted = 0;
        for branch in branches {
            if data.branches.iter().any(|known| known.name == branch.name) {
                continue;
            }
            data.branches.push(branch.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn commit_hashes(&self, repository_id: Uuid) -> Result<HashSet<String>> {
        Ok(self.read_data(repository_id, |data| {
            data.commits
                .iter()
                .map(|(_, commit)| commit.hash.clone())
                .collect()
        }))
    }

    async fn insert_commit(&self, repository_id: Uuid, commit: &CommitInfo) -> Result<Uuid> {
        let mut state = self.state.write();
        if state.rejected_commits.contains(&commit.hash) {
            bail!("commit {} rejected by store", commit.hash);
        }
        let data = Self::data_mut(&mut state, repository_id)?;
        if data.commits.iter().any(|(_, known)| known.hash == commit.hash) {
            bail!(
                "duplicate commit {} for repository {}",
                commit.hash,
                repository_id
            );
        }

        let id = Uuid::new_v4();
        let mut row = commit.clone();
        row.file_changes.clear();
        data.commits.push((id, row));
        state.commit_owners.insert(id, repository_id);
        Ok(id)
    }

    async fn insert_file_changes(
        &self,
        commit_id: Uuid,
        changes: &[FileChange],
    ) -> Result<usize> {
        let mut state = self.state.write();
        let repository_id = *state
            .commit_owners
            .get(&commit_id)
            .ok_or_else(|| anyhow!("commit {commit_id} does not exist"))?;
        let data = Self::data_mut(&mut state, repository_id)?;
        let (_, commit) = data
            .commits
            .iter_mut()
            .find(|(id, _)| *id == commit_id)
            .ok_or_else(|| anyhow!("commit {commit_id} does not exist"))?;
        commit.file_changes.extend_from_slice(changes);
        Ok(changes.len())
    }

    async fn file_paths(&self, repository_id: Uuid) -> Result<HashSet<String>> {
        Ok(self.read_data(repository_id, |data| {
            data.files.iter().map(|file| file.path.clone()).collect()
        }))
    }

    async fn insert_files(&self, repository_id: Uuid, files: &[FileEntry]) -> Result<usize> {
        let mut state = self.state.write();
        let data = Self::data_mut(&mut state, repository_id)?;
        let mut known: HashSet<String> = data.files.iter().map(|f| f.path.clone()).collect();
        let mut inserted = 0;
        for file in files {
            if known.insert(file.path.clone()) {
                data.files.push(file.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn replace_contributors(
        &self,
        repository_id: Uuid,
        contributors: &[ContributorStats],
    ) -> Result<()> {
        let mut state = self.state.write();
        Self::data_mut(&mut state, repository_id)?.contributors = contributors.to_vec();
        Ok(())
    }

    async fn replace_languages(
        &self,
        repository_id: Uuid,
        languages: &[LanguageShare],
    ) -> Result<()> {
        let mut state = self.state.write();
        Self::data_mut(&mut state, repository_id)?.languages = languages.to_vec();
        Ok(())
    }

    async fn branches(&self, repository_id: Uuid) -> Result<Vec<BranchInfo>> {
        Ok(self.read_data(repository_id, |data| data.branches.clone()))
    }

    async fn commits(&self, repository_id: Uuid, limit: usize) -> Result<Vec<CommitInfo>> {
        let mut commits: Vec<CommitInfo> = self.read_data(repository_id, |data| {
            data.commits.iter().map(|(_, c)| c.clone()).collect()
        });
        commits.sort_by(|a, b| b.committed_at.cmp(&a.committed_at));
        commits.truncate(limit);
        Ok(commits)
    }

    async fn files(&self, repository_id: Uuid) -> Result<Vec<FileEntry>> {
        Ok(self.read_data(repository_id, |data| data.files.clone()))
    }

    async fn contributors(&self, repository_id: Uuid) -> Result<Vec<ContributorStats>> {
        Ok(self.read_data(repository_id, |data| data.contributors.clone()))
    }

    async fn languages(&self, repository_id: Uuid) -> Result<Vec<LanguageShare>> {
        Ok(self.read_data(repository_id, |data| data.languages.clone()))
    }
}
