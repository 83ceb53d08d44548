//! Git extraction for repolyze
//!
//! Everything here reads a local working copy through the `git` CLI and turns the
//! output into typed records. Nothing in this module touches persistence or the network
//! (apart from [`clone_shallow`], which the pipeline uses to obtain the working copy).

mod command;
mod error;
pub mod languages;
pub mod log_parser;
mod repository;
pub mod types;

pub use command::{clone_shallow, GitCommand};
pub use error::GitError;
pub use log_parser::{CommitLog, ParseDiagnostic};
pub use repository::{
    count_lines, summarize_languages, ExtractionOptions, GitRepository, BINARY_BYTES_PER_LINE,
};
pub use types::{
    BranchInfo, ChangeType, CommitInfo, ContributorStats, FileChange, FileEntry, Hundredths,
    LanguageShare, LanguageStat,
};
