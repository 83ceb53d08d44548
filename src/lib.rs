// repolyze - git repository history ingestion
// Root library module

pub mod config;
pub mod error;
pub mod git;
pub mod observability;
pub mod pipeline;
pub mod store;

pub use config::AnalyzerConfig;
pub use error::{AnalysisError, ServiceError};
pub use observability::{init_logging, init_logging_with_level};

pub use git::{
    BranchInfo, ChangeType, CommitInfo, ContributorStats, ExtractionOptions, FileChange,
    FileEntry, GitError, GitRepository, Hundredths, LanguageShare, LanguageStat,
};

pub use pipeline::{
    AnalysisHandle, AnalysisReport, AnalysisWorker, EnqueueOutcome, Pipeline, PipelineOptions,
    RepositoryService, WorkerSummary,
};

pub use store::{
    AnalysisStore, MemoryStore, NewRepository, PgAnalysisStore, RepositoryRecord,
    RepositoryStatus,
};
