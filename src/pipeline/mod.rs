//! Repository analysis lifecycle
//!
//! [`RepositoryService`] registers repositories and queues work on the
//! [`AnalysisWorker`], which runs [`Pipeline::analyze`] with single-flight per
//! repository and a global concurrency bound.

pub mod aggregate;
mod ingestion;
mod scratch;
mod service;
mod worker;

pub use aggregate::normalize_language_shares;
pub use ingestion::{AnalysisReport, Pipeline, PipelineOptions};
pub use scratch::ScratchDir;
pub use service::{infer_repository_identifier, RepositoryService};
pub use worker::{AnalysisHandle, AnalysisWorker, EnqueueOutcome, WorkerSummary};
