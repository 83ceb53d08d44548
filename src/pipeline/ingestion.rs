//! End-to-end analysis of one repository: clone, extract, reconcile, persist

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::AnalysisError;
use crate::git::{clone_shallow, summarize_languages, ExtractionOptions, GitRepository};
use crate::observability::RunTimer;
use crate::pipeline::aggregate::normalize_language_shares;
use crate::pipeline::scratch::ScratchDir;
use crate::store::{AnalysisStore, AnalysisSummary, RepositoryRecord, RepositoryStatus};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub scratch_root: PathBuf,
    pub clone_depth: u32,
    pub commit_limit: usize,
    pub file_batch_size: usize,
    pub fallback_branch: String,
    pub analysis_timeout: Option<Duration>,
    pub extraction: ExtractionOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            scratch_root: config.scratch_root.clone(),
            clone_depth: config.clone_depth.max(1),
            commit_limit: config.commit_limit,
            file_batch_size: config.file_batch_size.max(1),
            fallback_branch: config.fallback_branch.clone(),
            analysis_timeout: config.analysis_timeout,
            extraction: ExtractionOptions {
                read_concurrency: config.read_concurrency.max(1),
            },
        }
    }
}

/// What one successful run wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub repository_id: Uuid,
    pub default_branch: String,
    pub size: u64,
    pub branches_inserted: usize,
    pub commits_inserted: usize,
    pub commits_failed: usize,
    pub file_changes_inserted: usize,
    pub file_changes_failed: usize,
    pub files_inserted: usize,
    pub contributors: usize,
    pub languages: usize,
    /// Commit log records dropped as malformed
    pub parse_diagnostics: usize,
    pub elapsed_ms: u64,
}

/// Runs analyses against a store
pub struct Pipeline<S: AnalysisStore> {
    store: Arc<S>,
    options: PipelineOptions,
}

impl<S: AnalysisStore> Pipeline<S> {
    pub fn new(store: Arc<S>, options: PipelineOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Analyze one repository and record the outcome on its status.
    ///
    /// Any failure after the status moves to `analyzing` leaves the repository `failed`
    /// with `last_error` set. The scratch clone is removed on every path.
    #[instrument(skip(self), fields(repository_id = %repository_id))]
    pub async fn analyze(&self, repository_id: Uuid) -> Result<AnalysisReport, AnalysisError> {
        let repository = self
            .store
            .find_repository(repository_id)
            .await?
            .ok_or(AnalysisError::NotFound(repository_id))?;

        let mut timer = RunTimer::start("repository analysis");
        self.store
            .set_status(repository_id, RepositoryStatus::Analyzing, None)
            .await?;
        info!(url = %repository.url, "Starting repository analysis");

        match self.run_in_scratch(&repository).await {
            Ok(mut report) => {
                report.elapsed_ms = timer.elapsed().as_millis() as u64;
                info!(
                    url = %repository.url,
                    default_branch = %report.default_branch,
                    commits = report.commits_inserted,
                    files = report.files_inserted,
                    elapsed_ms = report.elapsed_ms,
                    "Repository analysis completed"
                );
                Ok(report)
            }
            Err(err) => {
                timer.mark_failed();
                let message = err.to_string();
                if let Err(status_err) = self
                    .store
                    .set_status(repository_id, RepositoryStatus::Failed, Some(&message))
                    .await
                {
                    error!(
                        "Failed to mark repository {} failed: {:#}",
                        repository_id, status_err
                    );
                }
                warn!(url = %repository.url, "Repository analysis failed: {}", message);
                Err(err)
            }
        }
    }

    async fn run_in_scratch(
        &self,
        repository: &RepositoryRecord,
    ) -> Result<AnalysisReport, AnalysisError> {
        let scratch = ScratchDir::create(&self.options.scratch_root, repository.id)?;

        let result = match self.options.analysis_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.run(repository, scratch.path())).await {
                    Ok(result) => result,
                    Err(_) => Err(AnalysisError::TimedOut(repository.id, limit)),
                }
            }
            None => self.run(repository, scratch.path()).await,
        };

        scratch.release().await;
        result
    }

    async fn run(
        &self,
        repository: &RepositoryRecord,
        workdir: &Path,
    ) -> Result<AnalysisReport, AnalysisError> {
        let id = repository.id;
        clone_shallow(&repository.url, workdir, self.options.clone_depth).await?;
        let repo = GitRepository::open(workdir, self.options.extraction.clone())?;

        let mut report = AnalysisReport {
            repository_id: id,
            ..Default::default()
        };

        let branches = repo.resolve_branches().await?;
        report.branches_inserted = self.store.insert_branches(id, &branches).await?;
        let flagged_default = branches
            .iter()
            .find(|branch| branch.is_default)
            .map(|branch| branch.name.clone());
        report.default_branch = flagged_default
            .clone()
            .unwrap_or_else(|| self.options.fallback_branch.clone());

        match flagged_default {
            Some(branch) => self.ingest_commits(&repo, id, &branch, &mut report).await?,
            None if branches.is_empty() => info!("Clone has no branches, skipping commits"),
            None => warn!(
                "No default branch could be resolved, skipping commits (recorded as {})",
                report.default_branch
            ),
        }

        let files = repo.build_file_tree().await?;
        report.files_inserted = self.ingest_files(id, &files).await?;

        let contributors = repo.resolve_contributors().await?;
        self.store.replace_contributors(id, &contributors).await?;
        report.contributors = contributors.len();

        let languages = normalize_language_shares(summarize_languages(&files));
        self.store.replace_languages(id, &languages).await?;
        report.languages = languages.len();

        report.size = repo.repository_size().await;
        self.store
            .complete_analysis(
                id,
                &AnalysisSummary {
                    default_branch: report.default_branch.clone(),
                    size: report.size,
                    analyzed_at: Utc::now(),
                },
            )
            .await?;

        Ok(report)
    }

    async fn ingest_commits(
        &self,
        repo: &GitRepository,
        repository_id: Uuid,
        branch: &str,
        report: &mut AnalysisReport,
    ) -> Result<(), AnalysisError> {
        let log = repo
            .resolve_commits(branch, self.options.commit_limit)
            .await?;
        report.parse_diagnostics = log.diagnostics.len();

        let known = self.store.commit_hashes(repository_id).await?;
        for commit in log.commits.iter().filter(|c| !known.contains(&c.hash)) {
            let commit_id = match self.store.insert_commit(repository_id, commit).await {
                Ok(commit_id) => commit_id,
                Err(e) => {
                    warn!("Failed to insert commit {}: {:#}", commit.short_hash, e);
                    report.commits_failed += 1;
                    continue;
                }
            };
            report.commits_inserted += 1;

            if commit.file_changes.is_empty() {
                continue;
            }
            match self
                .store
                .insert_file_changes(commit_id, &commit.file_changes)
                .await
            {
                Ok(inserted) => report.file_changes_inserted += inserted,
                Err(e) => {
                    warn!(
                        "Failed to insert file changes for commit {}: {:#}",
                        commit.short_hash, e
                    );
                    report.file_changes_failed += commit.file_changes.len();
                }
            }
        }
        Ok(())
    }

    async fn ingest_files(
        &self,
        repository_id: Uuid,
        files: &[crate::git::FileEntry],
    ) -> Result<usize, AnalysisError> {
        let known = self.store.file_paths(repository_id).await?;
        let new_files: Vec<_> = files
            .iter()
            .filter(|file| !known.contains(&file.path))
            .cloned()
            .collect();

        let mut inserted = 0;
        for batch in new_files.chunks(self.options.file_batch_size) {
            inserted += self.store.insert_files(repository_id, batch).await?;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewRepository};

    async fn register(store: &MemoryStore, url: &str) -> Uuid {
        let (record, _) = store
            .create_repository(NewRepository {
                user_id: Uuid::new_v4(),
                url,
                name: "missing",
                description: None,
            })
            .await
            .unwrap();
        record.id
    }

    #[tokio::test]
    async fn test_unknown_repository_is_not_found() {
        let pipeline = Pipeline::new(Arc::new(MemoryStore::new()), PipelineOptions::default());
        let id = Uuid::new_v4();
        let err = pipeline.analyze(id).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_clone_failure_marks_failed_and_cleans_up() {
        let scratch_root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let missing = scratch_root.path().join("does-not-exist");
        let id = register(&store, &missing.to_string_lossy()).await;

        let options = PipelineOptions {
            scratch_root: scratch_root.path().join("scratch"),
            ..Default::default()
        };
        let pipeline = Pipeline::new(store.clone(), options);
        let err = pipeline.analyze(id).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Extraction(_)));

        let record = store.find_repository(id).await.unwrap().unwrap();
        assert_eq!(record.status, RepositoryStatus::Failed);
        assert!(record
            .last_error
            .as_deref()
            .unwrap()
            .starts_with("extraction failed"));

        let leftovers = std::fs::read_dir(scratch_root.path().join("scratch"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_options_from_config_clamp_zero_values() {
        let config = PipelineConfig {
            file_batch_size: 0,
            read_concurrency: 0,
            ..Default::default()
        };
        let options = PipelineOptions::from(&config);
        assert_eq!(options.file_batch_size, 1);
        assert_eq!(options.extraction.read_concurrency, 1);
    }
}
