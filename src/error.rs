//! Error types for the analysis pipeline and the repository service

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::git::GitError;

/// Why an analysis run did not complete
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("repository {0} not found")]
    NotFound(Uuid),

    #[error("extraction failed: {0}")]
    Extraction(#[from] GitError),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error("analysis of {0} timed out after {1:?}")]
    TimedOut(Uuid, Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        AnalysisError::Persistence(err)
    }
}

/// Errors surfaced by [`crate::RepositoryService`]
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("repository {0} not found")]
    NotFound(Uuid),

    #[error("invalid repository url: {0}")]
    InvalidUrl(String),

    #[error("analysis worker is not running")]
    WorkerStopped,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_keeps_context_chain() {
        let err: AnalysisError = anyhow::anyhow!("connection reset")
            .context("failed to insert files")
            .into();
        assert_eq!(
            err.to_string(),
            "persistence failed: failed to insert files: connection reset"
        );
    }

    #[test]
    fn test_git_errors_are_extraction_failures() {
        let err: AnalysisError = GitError::CommandFailed {
            command: "clone".to_string(),
            status: "exit status: 128".to_string(),
            stderr: "repository not found".to_string(),
        }
        .into();
        assert!(matches!(err, AnalysisError::Extraction(_)));
        assert!(err.to_string().starts_with("extraction failed:"));
    }
}
