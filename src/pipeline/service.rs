//! Repository registration and the user-facing analysis trigger

use std::sync::Arc;

use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::pipeline::worker::{AnalysisHandle, EnqueueOutcome};
use crate::store::{AnalysisStore, NewRepository, RepositoryRecord};

fn last_segment(path: &str) -> Option<String> {
    path.trim_matches('/')
        .split('/')
        .filter(|seg| !seg.is_empty())
        .next_back()
        .map(|segment| segment.trim_end_matches(".git").to_string())
        .filter(|segment| !segment.is_empty())
}

/// Last path segment of a repository URL, without a trailing `.git`.
pub fn infer_repository_identifier(git_url: &str) -> String {
    let inferred = if let Ok(parsed) = Url::parse(git_url) {
        last_segment(parsed.path())
    } else if let Some(stripped) = git_url.strip_prefix("git@") {
        stripped
            .split_once(':')
            .and_then(|(_, path)| last_segment(path))
    } else {
        // local clone sources
        last_segment(git_url)
    };

    inferred.unwrap_or_else(|| "repository".to_string())
}

/// Registers repositories and hands analyses to the worker. Reads are scoped to the
/// owning user.
pub struct RepositoryService<S: AnalysisStore> {
    store: Arc<S>,
    worker: AnalysisHandle,
}

impl<S: AnalysisStore> RepositoryService<S> {
    pub fn new(store: Arc<S>, worker: AnalysisHandle) -> Self {
        Self { store, worker }
    }

    /// Return the repository for (url, user), creating it if needed, and queue an
    /// analysis when it is new or its last run did not complete.
    #[instrument(skip(self, description))]
    pub async fn create_or_get(
        &self,
        url: &str,
        user_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<RepositoryRecord, ServiceError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ServiceError::InvalidUrl(url.to_string()));
        }

        if let Some(existing) = self.store.find_repository_by_url(url, user_id).await? {
            if existing.status.needs_analysis() {
                self.worker.enqueue(existing.id).await?;
            } else {
                debug!(status = %existing.status, "Repository already registered");
            }
            return Ok(existing);
        }

        let inferred;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => {
                inferred = infer_repository_identifier(url);
                inferred.as_str()
            }
        };

        let (record, created) = self
            .store
            .create_repository(NewRepository {
                user_id,
                url,
                name,
                description,
            })
            .await?;
        if created {
            info!(repository_id = %record.id, name = %record.name, "Registered repository");
        }
        if created || record.status.needs_analysis() {
            self.worker.enqueue(record.id).await?;
        }
        Ok(record)
    }

    /// Queue a fresh analysis regardless of the current status.
    #[instrument(skip(self))]
    pub async fn reanalyze(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<(RepositoryRecord, EnqueueOutcome), ServiceError> {
        let record = self.get(id, user_id).await?;
        let outcome = self.worker.enqueue(record.id).await?;
        Ok((record, outcome))
    }

    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<RepositoryRecord, ServiceError> {
        self.store
            .find_repository(id)
            .await?
            .filter(|record| record.user_id == user_id)
            .ok_or(ServiceError::NotFound(id))
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<RepositoryRecord>, ServiceError> {
        Ok(self.store.list_repositories(user_id).await?)
    }

    /// Delete a repository and all of its analysis data.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let record = self.get(id, user_id).await?;
        if !self.store.delete_repository(record.id).await? {
            return Err(ServiceError::NotFound(id));
        }
        info!(repository_id = %id, "Deleted repository");
        Ok(())
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn worker(&self) -> &AnalysisHandle {
        &self.worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_identifier_from_urls() {
        assert_eq!(
            infer_repository_identifier("https://github.com/rust-lang/cargo.git"),
            "cargo"
        );
        assert_eq!(
            infer_repository_identifier("https://gitlab.com/group/sub/project/"),
            "project"
        );
        assert_eq!(
            infer_repository_identifier("git@github.com:tokio-rs/tokio.git"),
            "tokio"
        );
        assert_eq!(infer_repository_identifier("/srv/git/mirror.git"), "mirror");
        assert_eq!(infer_repository_identifier("file:///tmp/demo"), "demo");
        assert_eq!(infer_repository_identifier("https://example.com"), "repository");
    }
}
