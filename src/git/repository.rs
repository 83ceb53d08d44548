//! Read-only extraction of history and file data from a local clone

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::git::command::GitCommand;
use crate::git::error::Result;
use crate::git::languages::detect_language;
use crate::git::languages::is_excluded_path;
use crate::git::log_parser::{
    aggregate_contributors, parse_author_log, parse_commit_log, parse_numstat, CommitLog,
    ParseDiagnostic, AUTHOR_LOG_FORMAT, COMMIT_LOG_FORMAT,
};
use crate::git::types::{
    is_protected_branch, BranchInfo, CommitInfo, ContributorStats, FileChange, FileEntry,
    LanguageStat,
};

/// Assumed average line width when a file cannot be read as text.
pub const BINARY_BYTES_PER_LINE: u64 = 80;

const LOCAL_PREFIX: &str = "refs/heads/";
const REMOTE_PREFIX: &str = "refs/remotes/origin/";

/// Tuning knobs for extraction
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Concurrent git/file reads while enriching commits and the file tree
    pub read_concurrency: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            read_concurrency: 16,
        }
    }
}

/// Wrapper around a local clone for reading and analysis
pub struct GitRepository {
    git: GitCommand,
    options: ExtractionOptions,
}

#[derive(Debug, Clone)]
struct BranchHead {
    name: String,
    reference: String,
    local: bool,
    last_commit_at: Option<DateTime<Utc>>,
    hash: String,
}

impl GitRepository {
    /// Open a git working copy from a path
    pub fn open(path: impl AsRef<Path>, options: ExtractionOptions) -> Result<Self> {
        let git = GitCommand::open(path)?;
        debug!("Opened git repository at: {:?}", git.repo_path());
        Ok(Self { git, options })
    }

    pub fn path(&self) -> &Path {
        self.git.repo_path()
    }

    /// Name of the remote default branch, falling back to the checked-out branch.
    pub async fn default_branch(&self) -> Option<String> {
        match self
            .git
            .run(&["symbolic-ref", "--quiet", "--short", "refs/remotes/origin/HEAD"])
            .await
        {
            Ok(out) => {
                let name = out.trim();
                let name = name.strip_prefix("origin/").unwrap_or(name);
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
            Err(e) => debug!("No remote HEAD reference: {}", e),
        }

        match self.git.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(out) => {
                let name = out.trim();
                (!name.is_empty() && name != "HEAD").then(|| name.to_string())
            }
            Err(e) => {
                debug!("Unable to resolve checked-out branch: {}", e);
                None
            }
        }
    }

    /// Every branch head with its reachable commit count, default branch first.
    #[instrument(skip(self), fields(repo = %self.path().display()))]
    pub async fn resolve_branches(&self) -> Result<Vec<BranchInfo>> {
        let default = self.default_branch().await;
        let listing = self
            .git
            .run(&[
                "for-each-ref",
                "--format=%(refname)|%(committerdate:iso-strict)|%(objectname)",
                "refs/heads",
                "refs/remotes/origin",
            ])
            .await?;

        let heads = parse_branch_refs(&listing);
        let mut branches = Vec::with_capacity(heads.len());
        for head in heads {
            let count = self
                .git
                .run(&["rev-list", "--count", &head.reference])
                .await?;
            let commit_count = count.trim().parse::<u64>().unwrap_or_else(|_| {
                warn!("Unexpected rev-list output for {}: {:?}", head.reference, count);
                0
            });

            branches.push(BranchInfo {
                is_default: default.as_deref() == Some(head.name.as_str()),
                is_protected: is_protected_branch(&head.name),
                name: head.name,
                commit_count,
                last_commit_at: head.last_commit_at,
                last_commit_hash: head.hash,
            });
        }

        branches.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| b.last_commit_at.cmp(&a.last_commit_at))
                .then_with(|| a.name.cmp(&b.name))
        });

        info!("Resolved {} branches", branches.len());
        Ok(branches)
    }

    /// Up to `limit` commits reachable from `branch`, newest first, with file changes.
    #[instrument(skip(self), fields(repo = %self.path().display()))]
    pub async fn resolve_commits(&self, branch: &str, limit: usize) -> Result<CommitLog> {
        let limit = limit.to_string();
        let format = format!("--format={COMMIT_LOG_FORMAT}");
        let output = self
            .git
            .run(&[
                "log",
                branch,
                "-n",
                &limit,
                &format,
                "--shortstat",
                "--no-color",
                "--",
            ])
            .await?;

        let parsed = parse_commit_log(&output, branch);
        report_diagnostics("commit log", &parsed.diagnostics);

        let commits: Vec<CommitInfo> = stream::iter(parsed.commits)
            .map(|commit| self.attach_file_changes(commit))
            .buffered(self.options.read_concurrency.max(1))
            .collect()
            .await;

        info!(branch, commits = commits.len(), "Resolved commits");
        Ok(CommitLog {
            commits,
            diagnostics: parsed.diagnostics,
        })
    }

    /// Per-file line counts for one commit.
    pub async fn file_changes(&self, hash: &str) -> Result<Vec<FileChange>> {
        let output = self
            .git
            .run(&[
                "diff-tree",
                "--numstat",
                "--no-commit-id",
                "--no-color",
                "-r",
                "--root",
                hash,
            ])
            .await?;
        Ok(parse_numstat(&output))
    }

    async fn attach_file_changes(&self, mut commit: CommitInfo) -> CommitInfo {
        match self.file_changes(&commit.hash).await {
            Ok(changes) => {
                if commit.files_changed == 0 && !changes.is_empty() {
                    commit.files_changed = changes.len() as u64;
                    commit.additions = changes.iter().map(|c| c.additions).sum();
                    commit.deletions = changes.iter().map(|c| c.deletions).sum();
                }
                commit.file_changes = changes;
            }
            Err(e) => {
                warn!(
                    "Failed to read file changes for commit {}: {}",
                    commit.short_hash, e
                );
            }
        }
        commit
    }

    /// Contributor totals over every commit reachable in the clone.
    #[instrument(skip(self), fields(repo = %self.path().display()))]
    pub async fn resolve_contributors(&self) -> Result<Vec<ContributorStats>> {
        let format = format!("--format={AUTHOR_LOG_FORMAT}");
        let output = self
            .git
            .run(&["log", "--all", &format, "--numstat", "--no-color"])
            .await?;

        let parsed = parse_author_log(&output);
        report_diagnostics("author log", &parsed.diagnostics);

        let contributors = aggregate_contributors(&parsed.commits);
        info!(
            commits = parsed.commits.len(),
            contributors = contributors.len(),
            "Resolved contributors"
        );
        Ok(contributors)
    }

    /// Tracked files outside the deny-list, with size, line count and language.
    #[instrument(skip(self), fields(repo = %self.path().display()))]
    pub async fn build_file_tree(&self) -> Result<Vec<FileEntry>> {
        let listing = self.git.run_raw(&["ls-files", "-z"]).await?;
        let paths: Vec<String> = listing
            .split(|byte| *byte == 0)
            .filter(|raw| !raw.is_empty())
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .filter(|path| {
                let excluded = is_excluded_path(path);
                if excluded {
                    debug!("Excluding path: {}", path);
                }
                !excluded
            })
            .collect();

        let mut files: Vec<FileEntry> = stream::iter(paths)
            .map(|path| self.describe_file(path))
            .buffer_unordered(self.options.read_concurrency.max(1))
            .filter_map(|entry| async move { entry })
            .collect()
            .await;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        info!("Built file tree with {} files", files.len());
        Ok(files)
    }

    async fn describe_file(&self, path: String) -> Option<FileEntry> {
        let full_path = self.path().join(&path);
        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                debug!("Skipping non-file tracked path: {}", path);
                return None;
            }
            Err(e) => {
                debug!("Skipping unreadable path {}: {}", path, e);
                return None;
            }
        };

        let size = metadata.len();
        let lines = match tokio::fs::read(&full_path).await {
            Ok(bytes) => count_lines(&bytes),
            Err(e) => {
                debug!("Estimating lines for {}: {}", path, e);
                size / BINARY_BYTES_PER_LINE
            }
        };

        let as_path = Path::new(&path);
        let name = as_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let extension = as_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        let language = detect_language(&path).map(String::from);

        Some(FileEntry {
            path,
            name,
            extension,
            size,
            lines,
            language,
        })
    }

    /// Language composition of the tracked file tree.
    pub async fn detect_languages(&self) -> Result<Vec<LanguageStat>> {
        let files = self.build_file_tree().await?;
        Ok(summarize_languages(&files))
    }

    /// Bytes on disk for the whole clone, `.git` included. Zero if the walk fails.
    pub async fn repository_size(&self) -> u64 {
        let root: PathBuf = self.path().to_path_buf();
        match tokio::task::spawn_blocking(move || directory_size(&root)).await {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => {
                debug!("Unable to measure repository size: {}", e);
                0
            }
            Err(e) => {
                debug!("Repository size task failed: {}", e);
                0
            }
        }
    }
}

fn report_diagnostics(source: &str, diagnostics: &[ParseDiagnostic]) {
    for diagnostic in diagnostics {
        warn!(
            source,
            line = diagnostic.line,
            excerpt = %diagnostic.excerpt,
            "Dropped malformed record: {}",
            diagnostic.reason
        );
    }
}

fn parse_branch_refs(listing: &str) -> Vec<BranchHead> {
    let mut heads: HashMap<String, BranchHead> = HashMap::new();

    for line in listing.lines() {
        let mut fields = line.splitn(3, '|');
        let (Some(reference), Some(date), Some(hash)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let (name, local) = if let Some(name) = reference.strip_prefix(LOCAL_PREFIX) {
            (name, true)
        } else if let Some(name) = reference.strip_prefix(REMOTE_PREFIX) {
            (name, false)
        } else {
            continue;
        };
        if name.is_empty() || name == "HEAD" {
            continue;
        }

        let head = BranchHead {
            name: name.to_string(),
            reference: reference.to_string(),
            local,
            last_commit_at: DateTime::parse_from_rfc3339(date.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            hash: hash.trim().to_string(),
        };

        match heads.get(name) {
            Some(existing) if existing.local && !head.local => {}
            _ => {
                heads.insert(head.name.clone(), head);
            }
        }
    }

    heads.into_values().collect()
}

/// Text line count, or a size-based estimate for binary content.
pub fn count_lines(bytes: &[u8]) -> u64 {
    let estimate = bytes.len() as u64 / BINARY_BYTES_PER_LINE;
    if bytes.contains(&0) {
        return estimate;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.lines().count() as u64,
        Err(_) => estimate,
    }
}

/// Aggregate a file tree by language. Percentages are byte shares, unrounded.
pub fn summarize_languages(files: &[FileEntry]) -> Vec<LanguageStat> {
    let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for file in files {
        if let Some(language) = file.language.as_deref() {
            let entry = totals.entry(language).or_default();
            entry.0 += file.size;
            entry.1 += file.lines;
        }
    }

    let total_bytes: u64 = totals.values().map(|(bytes, _)| bytes).sum();
    let mut languages: Vec<LanguageStat> = totals
        .into_iter()
        .map(|(name, (bytes, lines))| LanguageStat {
            name: name.to_string(),
            bytes,
            lines,
            percentage: if total_bytes == 0 {
                0.0
            } else {
                bytes as f64 * 100.0 / total_bytes as f64
            },
        })
        .collect();

    languages.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.name.cmp(&b.name))
    });
    languages
}

fn directory_size(root: &Path) -> walkdir::Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
