//! Storage traits and error types

use crate::model::{Issue, LinkEdge, PageRecord, Severity};
use crate::state::PageStatus;
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Runs are written once, after the crawl has finished and issues have been
/// aggregated. Page, link and issue writes each happen in one transaction.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run in the `running` state and returns its id
    fn create_run(
        &mut self,
        seed: &str,
        config_hash: &str,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status, effective host and finish time of a run
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        effective_host: &str,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    // ===== Run Contents =====

    fn save_pages(&mut self, run_id: i64, pages: &[PageRecord]) -> StorageResult<()>;

    fn save_links(&mut self, run_id: i64, links: &[LinkEdge]) -> StorageResult<()>;

    /// Saves issues in the given order
    fn save_issues(&mut self, run_id: i64, issues: &[Issue]) -> StorageResult<()>;

    /// Loads page records ordered by discovery ordinal
    fn load_pages(&self, run_id: i64) -> StorageResult<Vec<PageRecord>>;

    fn load_links(&self, run_id: i64) -> StorageResult<Vec<LinkEdge>>;

    /// Loads issues in the order they were saved
    fn load_issues(&self, run_id: i64) -> StorageResult<Vec<Issue>>;

    // ===== Statistics =====

    fn count_pages_by_status(&self, run_id: i64, status: PageStatus) -> StorageResult<u64>;

    fn count_total_pages(&self, run_id: i64) -> StorageResult<u64>;

    /// Issue counts per severity; severities without issues are absent
    fn count_issues_by_severity(&self, run_id: i64) -> StorageResult<HashMap<Severity, u64>>;

    fn count_links(&self, run_id: i64) -> StorageResult<u64>;
}
