// repolyze CLI - extract and analyze git repository history
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use repolyze::git::summarize_languages;
use repolyze::pipeline::normalize_language_shares;
use repolyze::{
    init_logging_with_level, AnalysisStore, AnalysisWorker, AnalyzerConfig, GitRepository,
    MemoryStore, PgAnalysisStore, Pipeline, PipelineOptions, RepositoryService,
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "repolyze - branches, commits, contributors and languages from git history",
    long_about = None,
    after_help = "EXAMPLES:
  # Inspect a local clone without persisting anything
  repolyze extract ./my-project

  # Clone and analyze remote repositories into an in-memory store
  repolyze analyze https://github.com/tokio-rs/tokio.git

  # Persist results to Postgres
  DATABASE_URL=postgres://localhost/repolyze repolyze analyze --init-schema <url>"
)]
struct Cli {
    /// Enable verbose logging (DEBUG level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// TOML configuration file; REPOLYZE_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract history and file data from a local clone and print it as JSON
    Extract {
        /// Path to the git working copy
        path: PathBuf,
        /// Branch to read commits from (defaults to the repository's default branch)
        #[arg(short, long)]
        branch: Option<String>,
        /// Maximum number of commits to read
        #[arg(short = 'n', long)]
        commit_limit: Option<usize>,
    },

    /// Clone and analyze repositories, then print the stored results as JSON
    Analyze {
        /// Repository URLs or local paths to clone
        #[arg(required = true)]
        urls: Vec<String>,
        /// Owner recorded on the repositories (random when omitted)
        #[arg(long)]
        user: Option<Uuid>,
        /// Postgres connection string; the in-memory store is used when absent
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Create the tables before analyzing
        #[arg(long)]
        init_schema: bool,
        /// Commits per repository included in the output
        #[arg(long, default_value = "20")]
        show_commits: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalyzerConfig> {
    let config = match path {
        Some(path) => {
            let path_str = path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Invalid config path: {:?}", path))?;
            let mut config = AnalyzerConfig::from_file(path_str)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_env()?;
            config
        }
        None => AnalyzerConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = init_logging_with_level(cli.verbose, cli.quiet);
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Extract {
            path,
            branch,
            commit_limit,
        } => {
            let limit = commit_limit.unwrap_or(config.pipeline.commit_limit);
            extract(path, branch, limit, &config).await
        }
        Commands::Analyze {
            urls,
            user,
            database_url,
            init_schema,
            show_commits,
        } => {
            let user_id = user.unwrap_or_else(Uuid::new_v4);
            if database_url.is_some() {
                config.database.url = database_url;
            }

            match config.database.url.clone() {
                Some(url) => {
                    let pool = sqlx::postgres::PgPoolOptions::new()
                        .max_connections(config.database.max_connections)
                        .acquire_timeout(config.database.acquire_timeout)
                        .connect(&url)
                        .await
                        .context("failed to connect to Postgres")?;
                    let store = PgAnalysisStore::new(pool.clone());
                    if init_schema {
                        store.bootstrap_schema().await?;
                    }
                    let result =
                        analyze(Arc::new(store), &config, &urls, user_id, show_commits).await;
                    pool.close().await;
                    result
                }
                None => {
                    analyze(
                        Arc::new(MemoryStore::new()),
                        &config,
                        &urls,
                        user_id,
                        show_commits,
                    )
                    .await
                }
            }
        }
    }
}

async fn extract(
    path: PathBuf,
    branch: Option<String>,
    limit: usize,
    config: &AnalyzerConfig,
) -> Result<()> {
    let options = PipelineOptions::from(&config.pipeline);
    let repo = GitRepository::open(&path, options.extraction)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let branches = repo.resolve_branches().await?;
    let branch = branch.or_else(|| {
        branches
            .iter()
            .find(|b| b.is_default)
            .map(|b| b.name.clone())
    });
    let commits = match &branch {
        Some(branch) => repo.resolve_commits(branch, limit).await?,
        None => Default::default(),
    };
    let contributors = repo.resolve_contributors().await?;
    let files = repo.build_file_tree().await?;
    let languages = normalize_language_shares(summarize_languages(&files));
    let size = repo.repository_size().await;

    let output = json!({
        "path": path,
        "default_branch": branch,
        "size": size,
        "branches": branches,
        "commits": commits.commits,
        "diagnostics": commits.diagnostics,
        "contributors": contributors,
        "files": files,
        "languages": languages,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn analyze<S: AnalysisStore>(
    store: Arc<S>,
    config: &AnalyzerConfig,
    urls: &[String],
    user_id: Uuid,
    show_commits: usize,
) -> Result<()> {
    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        PipelineOptions::from(&config.pipeline),
    ));
    let (handle, worker) = AnalysisWorker::spawn(pipeline, &config.worker);
    let service = RepositoryService::new(store.clone(), handle);

    let mut ids = Vec::with_capacity(urls.len());
    for url in urls {
        let record = service.create_or_get(url, user_id, None, None).await?;
        ids.push(record.id);
    }

    // closing the queue lets the worker finish the queued runs and stop
    drop(service);
    let summary = worker.await.context("analysis worker panicked")?;

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(record) = store.find_repository(id).await? else {
            continue;
        };
        results.push(json!({
            "repository": record,
            "branches": store.branches(id).await?,
            "commits": store.commits(id, show_commits).await?,
            "files": store.files(id).await?.len(),
            "contributors": store.contributors(id).await?,
            "languages": store.languages(id).await?,
        }));
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "completed": summary.completed,
            "failed": summary.failed,
            "repositories": results,
        }))?
    );
    Ok(())
}
