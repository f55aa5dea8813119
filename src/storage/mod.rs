//! Storage module for persisting validation runs
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Run tracking (seed, config hash, final status)
//! - Page records, the internal link graph and the ordered issue list
//! - Statistics queries for finished runs

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::crawler::ValidationRun;

use std::path::Path;

/// Opens (or creates) a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Writes a finished run (records, links and issues) and returns its run id
pub fn persist_run(
    storage: &mut dyn Storage,
    run: &ValidationRun,
    config_hash: &str,
) -> StorageResult<i64> {
    let run_id = storage.create_run(&run.seed, config_hash, run.started_at)?;

    storage.save_pages(run_id, &run.records)?;
    storage.save_links(run_id, &run.edges)?;
    storage.save_issues(run_id, &run.issues)?;

    let status = if run.deadline_hit {
        RunStatus::DeadlineExceeded
    } else {
        RunStatus::Completed
    };
    storage.complete_run(run_id, status, &run.effective_host, run.finished_at)?;

    tracing::info!(
        "Persisted run {} ({} pages, {} links, {} issues)",
        run_id,
        run.records.len(),
        run.edges.len(),
        run.issues.len()
    );

    Ok(run_id)
}

/// Represents a validation run in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub seed: String,
    pub effective_host: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished because the global deadline expired
    DeadlineExceeded,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "deadline_exceeded" => Some(Self::DeadlineExceeded),
            _ => None,
        }
    }
}
