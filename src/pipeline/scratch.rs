//! Per-run scratch directories for shallow clones

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// A uniquely named directory that holds one run's clone.
///
/// Call [`ScratchDir::release`] on the way out of a run so removal failures are logged.
/// If the owning future is dropped or panics first, the inner `TempDir` removes the
/// directory on drop instead.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Create `<root>/repolyze-<repository id>-<random>`.
    pub fn create(root: &Path, repository_id: Uuid) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("repolyze-{repository_id}-"))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!("Created scratch directory {}", path.display());
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory. Failures are logged, never returned.
    pub async fn release(mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!("Removed scratch directory {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove scratch directory {}: {}", path.display(), e),
            Err(e) => warn!("Scratch cleanup task failed for {}: {}", path.display(), e),
        }
    }
}
