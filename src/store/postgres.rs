//! Postgres-backed store

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{AnalysisStore, AnalysisSummary, NewRepository, RepositoryRecord, RepositoryStatus};
use crate::git::{
    BranchInfo, ChangeType, CommitInfo, ContributorStats, FileChange, FileEntry, Hundredths,
    LanguageShare,
};

/// Tables the store expects. Deleting a repository cascades to every derived row.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    url TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    default_branch TEXT,
    size BIGINT NOT NULL DEFAULT 0,
    last_analyzed_at TIMESTAMPTZ,
    last_error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (user_id, url)
);

CREATE TABLE IF NOT EXISTS branches (
    repository_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    is_default BOOLEAN NOT NULL,
    is_protected BOOLEAN NOT NULL,
    commit_count BIGINT NOT NULL,
    last_commit_at TIMESTAMPTZ,
    last_commit_hash TEXT NOT NULL,
    PRIMARY KEY (repository_id, name)
);

CREATE TABLE IF NOT EXISTS commits (
    id UUID PRIMARY KEY,
    repository_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    hash TEXT NOT NULL,
    short_hash TEXT NOT NULL,
    message TEXT NOT NULL,
    description TEXT,
    author_name TEXT NOT NULL,
    author_email TEXT NOT NULL,
    committed_at TIMESTAMPTZ NOT NULL,
    branch TEXT NOT NULL,
    additions BIGINT NOT NULL,
    deletions BIGINT NOT NULL,
    files_changed BIGINT NOT NULL,
    UNIQUE (repository_id, hash)
);

CREATE TABLE IF NOT EXISTS file_changes (
    commit_id UUID NOT NULL REFERENCES commits(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    additions BIGINT NOT NULL,
    deletions BIGINT NOT NULL,
    change_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    repository_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    extension TEXT,
    size BIGINT NOT NULL,
    lines BIGINT NOT NULL,
    language TEXT,
    PRIMARY KEY (repository_id, path)
);

CREATE TABLE IF NOT EXISTS contributors (
    repository_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    commits BIGINT NOT NULL,
    additions BIGINT NOT NULL,
    deletions BIGINT NOT NULL,
    percentage DOUBLE PRECISION NOT NULL,
    first_commit TIMESTAMPTZ NOT NULL,
    last_commit TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS languages (
    repository_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    bytes BIGINT NOT NULL,
    lines BIGINT NOT NULL,
    percentage NUMERIC(5, 2) NOT NULL
);
"#;

const REPOSITORY_COLUMNS: &str = "id, user_id, url, name, description, status, default_branch, \
     size, last_analyzed_at, last_error, created_at";

fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct RepositoryRow {
    id: Uuid,
    user_id: Uuid,
    url: String,
    name: String,
    description: Option<String>,
    status: String,
    default_branch: Option<String>,
    size: i64,
    last_analyzed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RepositoryRow> for RepositoryRecord {
    type Error = anyhow::Error;

    fn try_from(row: RepositoryRow) -> Result<Self> {
        Ok(RepositoryRecord {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            name: row.name,
            description: row.description,
            status: row.status.parse()?,
            default_branch: row.default_branch,
            size: from_db(row.size),
            last_analyzed_at: row.last_analyzed_at,
            last_error: row.last_error,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    name: String,
    is_default: bool,
    is_protected: bool,
    commit_count: i64,
    last_commit_at: Option<DateTime<Utc>>,
    last_commit_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CommitRow {
    id: Uuid,
    hash: String,
    short_hash: String,
    message: String,
    description: Option<String>,
    author_name: String,
    author_email: String,
    committed_at: DateTime<Utc>,
    branch: String,
    additions: i64,
    deletions: i64,
    files_changed: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct FileChangeRow {
    commit_id: Uuid,
    path: String,
    additions: i64,
    deletions: i64,
    change_type: String,
}

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    path: String,
    name: String,
    extension: Option<String>,
    size: i64,
    lines: i64,
    language: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ContributorRow {
    name: String,
    email: String,
    commits: i64,
    additions: i64,
    deletions: i64,
    percentage: f64,
    first_commit: DateTime<Utc>,
    last_commit: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LanguageRow {
    name: String,
    bytes: i64,
    lines: i64,
    hundredths: i32,
}

/// [`AnalysisStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Create the tables in [`SCHEMA`] if they are missing.
    pub async fn bootstrap_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("failed to bootstrap analysis schema")?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    #[instrument(skip(self))]
    async fn find_repository(&self, id: Uuid) -> Result<Option<RepositoryRecord>> {
        let row = sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch repository")?;

        row.map(RepositoryRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_repository_by_url(
        &self,
        url: &str,
        user_id: Uuid,
    ) -> Result<Option<RepositoryRecord>> {
        let row = sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE url = $1 AND user_id = $2"
        ))
        .bind(url)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch repository by url")?;

        row.map(RepositoryRecord::try_from).transpose()
    }

    #[instrument(skip(self, repository), fields(url = repository.url))]
    async fn create_repository(
        &self,
        repository: NewRepository<'_>,
    ) -> Result<(RepositoryRecord, bool)> {
        let inserted = sqlx::query_as::<_, RepositoryRow>(&format!(
            r#"
            INSERT INTO repositories (id, user_id, url, name, description, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            ON CONFLICT (user_id, url) DO NOTHING
            RETURNING {REPOSITORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(repository.user_id)
        .bind(repository.url)
        .bind(repository.name)
        .bind(repository.description)
        .fetch_optional(&self.pool)
        .await
        .context("failed to insert repository record")?;

        if let Some(row) = inserted {
            return Ok((row.try_into()?, true));
        }

        let existing = self
            .find_repository_by_url(repository.url, repository.user_id)
            .await?
            .context("repository conflicted on insert but could not be read back")?;
        Ok((existing, false))
    }

    #[instrument(skip(self))]
    async fn list_repositories(&self, user_id: Uuid) -> Result<Vec<RepositoryRecord>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE user_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list repositories")?;

        rows.into_iter().map(RepositoryRecord::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn delete_repository(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM repositories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete repository")?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, last_error))]
    async fn set_status(
        &self,
        id: Uuid,
        status: RepositoryStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE repositories
            SET status = $2,
                last_error = COALESCE($3, last_error),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(last_error)
        .execute(&self.pool)
        .await
        .context("failed to update repository status")?;
        Ok(())
    }

    #[instrument(skip(self, summary))]
    async fn complete_analysis(&self, id: Uuid, summary: &AnalysisSummary) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE repositories
            SET status = 'completed',
                default_branch = $2,
                size = $3,
                last_analyzed_at = $4,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&summary.default_branch)
        .bind(to_db(summary.size))
        .bind(summary.analyzed_at)
        .execute(&self.pool)
        .await
        .context("failed to mark repository completed")?;
        Ok(())
    }

    #[instrument(skip(self, branches), fields(count = branches.len()))]
    async fn insert_branches(
        &self,
        repository_id: Uuid,
        branches: &[BranchInfo],
    ) -> Result<usize> {
        let result = sqlx::query(
            r#"
            INSERT INTO branches (
                repository_id, name, is_default, is_protected,
                commit_count, last_commit_at, last_commit_hash
            )
            SELECT $1, * FROM UNNEST(
                $2::text[], $3::bool[], $4::bool[], $5::bigint[], $6::timestamptz[], $7::text[]
            )
            ON CONFLICT (repository_id, name) DO NOTHING
            "#,
        )
        .bind(repository_id)
        .bind(branches.iter().map(|b| b.name.clone()).collect::<Vec<_>>())
        .bind(branches.iter().map(|b| b.is_default).collect::<Vec<_>>())
        .bind(branches.iter().map(|b| b.is_protected).collect::<Vec<_>>())
        .bind(branches.iter().map(|b| to_db(b.commit_count)).collect::<Vec<_>>())
        .bind(branches.iter().map(|b| b.last_commit_at).collect::<Vec<_>>())
        .bind(
            branches
                .iter()
                .map(|b| b.last_commit_hash.clone())
                .collect::<Vec<_>>(),
        )
        .execute(&self.pool)
        .await
        .context("failed to insert branches")?;
        Ok(result.rows_affected() as usize)
    }

    async fn commit_hashes(&self, repository_id: Uuid) -> Result<HashSet<String>> {
        let hashes =
            sqlx::query_scalar::<_, String>("SELECT hash FROM commits WHERE repository_id = $1")
                .bind(repository_id)
                .fetch_all(&self.pool)
                .await
                .context("failed to fetch commit hashes")?;
        Ok(hashes.into_iter().collect())
    }

    #[instrument(skip(self, commit), fields(hash = %commit.short_hash))]
    async fn insert_commit(&self, repository_id: Uuid, commit: &CommitInfo) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO commits (
                id, repository_id, hash, short_hash, message, description,
                author_name, author_email, committed_at, branch,
                additions, deletions, files_changed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(repository_id)
        .bind(&commit.hash)
        .bind(&commit.short_hash)
        .bind(&commit.message)
        .bind(&commit.description)
        .bind(&commit.author_name)
        .bind(&commit.author_email)
        .bind(commit.committed_at)
        .bind(&commit.branch)
        .bind(to_db(commit.additions))
        .bind(to_db(commit.deletions))
        .bind(to_db(commit.files_changed))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert commit {}", commit.hash))?;
        Ok(id)
    }

    async fn insert_file_changes(
        &self,
        commit_id: Uuid,
        changes: &[FileChange],
    ) -> Result<usize> {
        if changes.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            INSERT INTO file_changes (commit_id, path, additions, deletions, change_type)
            SELECT $1, * FROM UNNEST($2::text[], $3::bigint[], $4::bigint[], $5::text[])
            "#,
        )
        .bind(commit_id)
        .bind(changes.iter().map(|c| c.path.clone()).collect::<Vec<_>>())
        .bind(changes.iter().map(|c| to_db(c.additions)).collect::<Vec<_>>())
        .bind(changes.iter().map(|c| to_db(c.deletions)).collect::<Vec<_>>())
        .bind(
            changes
                .iter()
                .map(|c| c.change_type.as_str())
                .collect::<Vec<_>>(),
        )
        .execute(&self.pool)
        .await
        .context("failed to insert file changes")?;
        Ok(result.rows_affected() as usize)
    }

    async fn file_paths(&self, repository_id: Uuid) -> Result<HashSet<String>> {
        let paths =
            sqlx::query_scalar::<_, String>("SELECT path FROM files WHERE repository_id = $1")
                .bind(repository_id)
                .fetch_all(&self.pool)
                .await
                .context("failed to fetch file paths")?;
        Ok(paths.into_iter().collect())
    }

    #[instrument(skip(self, files), fields(count = files.len()))]
    async fn insert_files(&self, repository_id: Uuid, files: &[FileEntry]) -> Result<usize> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (repository_id, path, name, extension, size, lines, language)
            SELECT $1, * FROM UNNEST(
                $2::text[], $3::text[], $4::text[], $5::bigint[], $6::bigint[], $7::text[]
            )
            ON CONFLICT (repository_id, path) DO NOTHING
            "#,
        )
        .bind(repository_id)
        .bind(files.iter().map(|f| f.path.clone()).collect::<Vec<_>>())
        .bind(files.iter().map(|f| f.name.clone()).collect::<Vec<_>>())
        .bind(files.iter().map(|f| f.extension.clone()).collect::<Vec<_>>())
        .bind(files.iter().map(|f| to_db(f.size)).collect::<Vec<_>>())
        .bind(files.iter().map(|f| to_db(f.lines)).collect::<Vec<_>>())
        .bind(files.iter().map(|f| f.language.clone()).collect::<Vec<_>>())
        .execute(&self.pool)
        .await
        .context("failed to insert files")?;
        Ok(result.rows_affected() as usize)
    }

    #[instrument(skip(self, contributors), fields(count = contributors.len()))]
    async fn replace_contributors(
        &self,
        repository_id: Uuid,
        contributors: &[ContributorStats],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM contributors WHERE repository_id = $1")
            .bind(repository_id)
            .execute(&mut *tx)
            .await
            .context("failed to clear contributors")?;

        sqlx::query(
            r#"
            INSERT INTO contributors (
                repository_id, name, email, commits, additions, deletions,
                percentage, first_commit, last_commit
            )
            SELECT $1, * FROM UNNEST(
                $2::text[], $3::text[], $4::bigint[], $5::bigint[], $6::bigint[],
                $7::float8[], $8::timestamptz[], $9::timestamptz[]
            )
            "#,
        )
        .bind(repository_id)
        .bind(contributors.iter().map(|c| c.name.clone()).collect::<Vec<_>>())
        .bind(contributors.iter().map(|c| c.email.clone()).collect::<Vec<_>>())
        .bind(contributors.iter().map(|c| to_db(c.commits)).collect::<Vec<_>>())
        .bind(contributors.iter().map(|c| to_db(c.additions)).collect::<Vec<_>>())
        .bind(contributors.iter().map(|c| to_db(c.deletions)).collect::<Vec<_>>())
        .bind(contributors.iter().map(|c| c.percentage).collect::<Vec<_>>())
        .bind(contributors.iter().map(|c| c.first_commit).collect::<Vec<_>>())
        .bind(contributors.iter().map(|c| c.last_commit).collect::<Vec<_>>())
        .execute(&mut *tx)
        .await
        .context("failed to insert contributors")?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, languages), fields(count = languages.len()))]
    async fn replace_languages(
        &self,
        repository_id: Uuid,
        languages: &[LanguageShare],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM languages WHERE repository_id = $1")
            .bind(repository_id)
            .execute(&mut *tx)
            .await
            .context("failed to clear languages")?;

        sqlx::query(
            r#"
            INSERT INTO languages (repository_id, name, bytes, lines, percentage)
            SELECT $1, t.name, t.bytes, t.lines, t.hundredths::numeric / 100
            FROM UNNEST($2::text[], $3::bigint[], $4::bigint[], $5::int4[])
                AS t(name, bytes, lines, hundredths)
            "#,
        )
        .bind(repository_id)
        .bind(languages.iter().map(|l| l.name.clone()).collect::<Vec<_>>())
        .bind(languages.iter().map(|l| to_db(l.bytes)).collect::<Vec<_>>())
        .bind(languages.iter().map(|l| to_db(l.lines)).collect::<Vec<_>>())
        .bind(
            languages
                .iter()
                .map(|l| i32::try_from(l.percentage.0).unwrap_or(i32::MAX))
                .collect::<Vec<_>>(),
        )
        .execute(&mut *tx)
        .await
        .context("failed to insert languages")?;

        tx.commit().await?;
        Ok(())
    }

    async fn branches(&self, repository_id: Uuid) -> Result<Vec<BranchInfo>> {
        let rows = sqlx::query_as::<_, BranchRow>(
            r#"
            SELECT name, is_default, is_protected, commit_count, last_commit_at, last_commit_hash
            FROM branches
            WHERE repository_id = $1
            ORDER BY is_default DESC, last_commit_at DESC NULLS LAST, name
            "#,
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch branches")?;

        Ok(rows
            .into_iter()
            .map(|row| BranchInfo {
                name: row.name,
                is_default: row.is_default,
                is_protected: row.is_protected,
                commit_count: from_db(row.commit_count),
                last_commit_at: row.last_commit_at,
                last_commit_hash: row.last_commit_hash,
            })
            .collect())
    }

    async fn commits(&self, repository_id: Uuid, limit: usize) -> Result<Vec<CommitInfo>> {
        let rows = sqlx::query_as::<_, CommitRow>(
            r#"
            SELECT id, hash, short_hash, message, description, author_name, author_email,
                   committed_at, branch, additions, deletions, files_changed
            FROM commits
            WHERE repository_id = $1
            ORDER BY committed_at DESC
            LIMIT $2
            "#,
        )
        .bind(repository_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch commits")?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let change_rows = sqlx::query_as::<_, FileChangeRow>(
            r#"
            SELECT commit_id, path, additions, deletions, change_type
            FROM file_changes
            WHERE commit_id = ANY($1)
            ORDER BY path
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch file changes")?;

        let mut changes: HashMap<Uuid, Vec<FileChange>> = HashMap::new();
        for row in change_rows {
            let change_type = row
                .change_type
                .parse::<ChangeType>()
                .map_err(anyhow::Error::msg)?;
            changes.entry(row.commit_id).or_default().push(FileChange {
                path: row.path,
                additions: from_db(row.additions),
                deletions: from_db(row.deletions),
                change_type,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| CommitInfo {
                file_changes: changes.remove(&row.id).unwrap_or_default(),
                hash: row.hash,
                short_hash: row.short_hash,
                message: row.message,
                description: row.description,
                author_name: row.author_name,
                author_email: row.author_email,
                committed_at: row.committed_at,
                branch: row.branch,
                additions: from_db(row.additions),
                deletions: from_db(row.deletions),
                files_changed: from_db(row.files_changed),
            })
            .collect())
    }

    async fn files(&self, repository_id: Uuid) -> Result<Vec<FileEntry>> {
        let rows = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT path, name, extension, size, lines, language
            FROM files
            WHERE repository_id = $1
            ORDER BY path
            "#,
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch files")?;

        Ok(rows
            .into_iter()
            .map(|row| FileEntry {
                path: row.path,
                name: row.name,
                extension: row.extension,
                size: from_db(row.size),
                lines: from_db(row.lines),
                language: row.language,
            })
            .collect())
    }

    async fn contributors(&self, repository_id: Uuid) -> Result<Vec<ContributorStats>> {
        let rows = sqlx::query_as::<_, ContributorRow>(
            r#"
            SELECT name, email, commits, additions, deletions, percentage,
                   first_commit, last_commit
            FROM contributors
            WHERE repository_id = $1
            ORDER BY commits DESC, email
            "#,
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch contributors")?;

        Ok(rows
            .into_iter()
            .map(|row| ContributorStats {
                name: row.name,
                email: row.email,
                commits: from_db(row.commits),
                additions: from_db(row.additions),
                deletions: from_db(row.deletions),
                percentage: row.percentage,
                first_commit: row.first_commit,
                last_commit: row.last_commit,
            })
            .collect())
    }

    async fn languages(&self, repository_id: Uuid) -> Result<Vec<LanguageShare>> {
        let rows = sqlx::query_as::<_, LanguageRow>(
            r#"
            SELECT name, bytes, lines, (percentage * 100)::int4 AS hundredths
            FROM languages
            WHERE repository_id = $1
            ORDER BY percentage DESC, name
            "#,
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch languages")?;

        Ok(rows
            .into_iter()
            .map(|row| LanguageShare {
                name: row.name,
                bytes: from_db(row.bytes),
                lines: from_db(row.lines),
                percentage: Hundredths(u32::try_from(row.hundredths).unwrap_or(0)),
            })
            .collect())
    }
}
