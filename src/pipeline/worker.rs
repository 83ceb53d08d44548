//! Background worker that runs queued analyses

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::ServiceError;
use crate::pipeline::ingestion::Pipeline;
use crate::store::AnalysisStore;

type InFlight = Arc<DashMap<Uuid, ()>>;

/// Result of asking the worker to analyze a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// A run for this id is already queued or executing
    AlreadyInFlight,
}

/// Totals over the worker's lifetime, returned when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub completed: usize,
    pub failed: usize,
}

/// Sending side of the worker queue. Cheap to clone.
#[derive(Clone)]
pub struct AnalysisHandle {
    sender: mpsc::Sender<Uuid>,
    in_flight: InFlight,
}

impl AnalysisHandle {
    /// Queue an analysis unless one for the same repository is queued or running.
    pub async fn enqueue(&self, repository_id: Uuid) -> Result<EnqueueOutcome, ServiceError> {
        if self.in_flight.insert(repository_id, ()).is_some() {
            debug!(%repository_id, "Analysis already in flight, not queueing");
            return Ok(EnqueueOutcome::AlreadyInFlight);
        }

        if self.sender.send(repository_id).await.is_err() {
            self.in_flight.remove(&repository_id);
            return Err(ServiceError::WorkerStopped);
        }
        debug!(%repository_id, "Analysis queued");
        Ok(EnqueueOutcome::Queued)
    }

    pub fn is_in_flight(&self, repository_id: Uuid) -> bool {
        self.in_flight.contains_key(&repository_id)
    }
}

// Frees the single-flight slot even if the run panics.
struct InFlightGuard {
    in_flight: InFlight,
    repository_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.repository_id);
    }
}

/// Receives repository ids and runs at most `max_concurrent` analyses at a time.
///
/// The worker stops once every [`AnalysisHandle`] is dropped and the runs it already
/// started have finished.
pub struct AnalysisWorker<S: AnalysisStore> {
    pipeline: Arc<Pipeline<S>>,
    receiver: mpsc::Receiver<Uuid>,
    in_flight: InFlight,
    permits: Arc<Semaphore>,
}

impl<S: AnalysisStore> AnalysisWorker<S> {
    pub fn new(pipeline: Arc<Pipeline<S>>, config: &WorkerConfig) -> (Self, AnalysisHandle) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let in_flight: InFlight = Arc::new(DashMap::new());
        let worker = Self {
            pipeline,
            receiver,
            in_flight: in_flight.clone(),
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        };
        (worker, AnalysisHandle { sender, in_flight })
    }

    /// Start the worker on the current runtime.
    pub fn spawn(
        pipeline: Arc<Pipeline<S>>,
        config: &WorkerConfig,
    ) -> (AnalysisHandle, JoinHandle<WorkerSummary>) {
        let (worker, handle) = Self::new(pipeline, config);
        (handle, tokio::spawn(worker.run()))
    }

    #[instrument(skip_all)]
    pub async fn run(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary::default();
        let mut tasks: JoinSet<bool> = JoinSet::new();

        loop {
            tokio::select! {
                received = self.receiver.recv() => {
                    let Some(repository_id) = received else {
                        break;
                    };
                    let Ok(permit) = self.permits.clone().acquire_owned().await else {
                        break;
                    };
                    let guard = InFlightGuard {
                        in_flight: self.in_flight.clone(),
                        repository_id,
                    };
                    let pipeline = self.pipeline.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        let _guard = guard;
                        match pipeline.analyze(repository_id).await {
                            Ok(report) => {
                                info!(
                                    %repository_id,
                                    commits = report.commits_inserted,
                                    commits_failed = report.commits_failed,
                                    files = report.files_inserted,
                                    elapsed_ms = report.elapsed_ms,
                                    "Analysis finished"
                                );
                                true
                            }
                            Err(e) => {
                                error!(%repository_id, "Analysis failed: {}", e);
                                false
                            }
                        }
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    record_outcome(&mut summary, joined);
                }
            }
        }

        debug!(pending = tasks.len(), "Worker queue closed, draining runs");
        while let Some(joined) = tasks.join_next().await {
            record_outcome(&mut summary, joined);
        }
        info!(
            completed = summary.completed,
            failed = summary.failed,
            "Analysis worker stopped"
        );
        summary
    }
}

fn record_outcome(summary: &mut WorkerSummary, joined: Result<bool, tokio::task::JoinError>) {
    match joined {
        Ok(true) => summary.completed += 1,
        Ok(false) => summary.failed += 1,
        Err(e) => {
            warn!("Analysis task did not finish: {}", e);
            summary.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion::PipelineOptions;
    use crate::store::MemoryStore;

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            max_concurrent: 2,
            queue_capacity: 8,
        }
    }

    fn pipeline() -> Arc<Pipeline<MemoryStore>> {
        Arc::new(Pipeline::new(
            Arc::new(MemoryStore::new()),
            PipelineOptions::default(),
        ))
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_is_collapsed() {
        let (worker, handle) = AnalysisWorker::new(pipeline(), &worker_config());
        let id = Uuid::new_v4();

        assert_eq!(handle.enqueue(id).await.unwrap(), EnqueueOutcome::Queued);
        assert_eq!(
            handle.enqueue(id).await.unwrap(),
            EnqueueOutcome::AlreadyInFlight
        );
        assert!(handle.is_in_flight(id));

        drop(handle);
        let summary = tokio::spawn(worker.run()).await.unwrap();

        // unknown repository: exactly one failed run
        assert_eq!(summary, WorkerSummary { completed: 0, failed: 1 });
    }

    #[tokio::test]
    async fn test_slot_is_released_after_run() {
        let (worker, handle) = AnalysisWorker::new(pipeline(), &worker_config());
        let id = Uuid::new_v4();
        handle.enqueue(id).await.unwrap();

        let in_flight = handle.in_flight.clone();
        drop(handle);
        worker.run().await;
        assert!(!in_flight.contains_key(&id));
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_fails() {
        let (worker, handle) = AnalysisWorker::new(pipeline(), &worker_config());
        drop(worker);
        let id = Uuid::new_v4();
        assert!(matches!(
            handle.enqueue(id).await,
            Err(ServiceError::WorkerStopped)
        ));
        assert!(!handle.is_in_flight(id));
    }
}
